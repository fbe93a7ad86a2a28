pub mod api;
pub mod config;
pub mod engine;
pub mod init;
pub mod storage;
