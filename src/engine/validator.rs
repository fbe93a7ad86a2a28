use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub const MIN_DOMAIN_LEN: usize = 3;
pub const MAX_DOMAIN_LEN: usize = 100;
pub const MAX_LABEL_LEN: usize = 63;

/// A trimmed, lower-cased hostname that passed [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Domain(Box<str>);

impl Domain {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("Domain must be at least 3 characters.")]
    TooShort,
    #[error("Domain must be at most 100 characters.")]
    TooLong,
    #[error("Please enter a valid domain (e.g., example.com)")]
    InvalidFormat,
}

/// Trims and lower-cases `raw`, then checks it against the hostname grammar.
pub fn validate(raw: &str) -> Result<Domain, FormatError> {
    let normalized = raw.trim().to_lowercase();

    let len = normalized.chars().count();
    if len < MIN_DOMAIN_LEN {
        return Err(FormatError::TooShort);
    }
    if len > MAX_DOMAIN_LEN {
        return Err(FormatError::TooLong);
    }

    if !normalized.split('.').all(is_valid_label) {
        return Err(FormatError::InvalidFormat);
    }

    Ok(Domain(normalized.into_boxed_str()))
}

fn is_valid_label(label: &str) -> bool {
    if label.is_empty() || label.len() > MAX_LABEL_LEN {
        return false;
    }
    if label.starts_with('-') || label.ends_with('-') {
        return false;
    }
    label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}
