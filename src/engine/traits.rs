/// The "Hot Path" check the host runs against the current blocklist.
pub trait BlocklistMatcher: Send + Sync {
    /// Returns the blocklist entry covering `host`, or None if allowed.
    fn check(&self, host: &str) -> Option<&str>;
}
