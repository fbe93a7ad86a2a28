use super::traits::BlocklistMatcher;
use super::validator::Domain;
use rustc_hash::FxHashSet;

/// In-memory matcher over a blocklist snapshot using FxHashSet<Box<str>>
#[derive(Debug, Default)]
pub struct HashedMatcher {
    domains: FxHashSet<Box<str>>,
}

impl HashedMatcher {
    pub fn new<'a>(domains: impl IntoIterator<Item = &'a Domain>) -> Self {
        Self {
            domains: domains
                .into_iter()
                .map(|d| Box::from(d.as_str()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

impl BlocklistMatcher for HashedMatcher {
    fn check(&self, host: &str) -> Option<&str> {
        let host = host.trim().trim_end_matches('.').to_ascii_lowercase();

        // Exact match first, then strip leading labels
        let mut part = host.as_str();
        loop {
            if let Some(entry) = self.domains.get(part) {
                return Some(entry.as_ref());
            }

            match part.find('.') {
                Some(idx) => {
                    part = &part[idx + 1..];
                    if part.is_empty() {
                        break;
                    }
                }
                None => break,
            }
        }

        None
    }
}
