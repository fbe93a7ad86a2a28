mod matcher;
mod store;
mod theme;
mod traits;
mod validator;

pub use matcher::HashedMatcher;
pub use store::{
    BlocklistError, BlocklistEvent, BlocklistStore, StoreState, DEFAULT_BLOCKLIST_KEY,
};
pub use theme::{Theme, ThemeError, ThemeStore, DEFAULT_THEME_KEY};
pub use traits::BlocklistMatcher;
pub use validator::{validate, Domain, FormatError, MAX_DOMAIN_LEN, MIN_DOMAIN_LEN};
