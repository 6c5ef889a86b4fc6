//! Opaque identifiers for enrichment pipeline entities

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(QueueItemId);
uuid_id!(EvidenceId);
uuid_id!(ClaimId);

/// Content-addressed digest of a normalized URL (scheme+host lowercased,
/// path/query preserved), used as the unique key for `EvidenceSource`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UrlHash(pub [u8; 32]);

impl UrlHash {
    pub fn of(url: &str) -> Self {
        Self::of_normalized(&normalize_url(url))
    }

    fn of_normalized(normalized: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }
}

impl fmt::Display for UrlHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Lowercases scheme and host, leaves path/query untouched.
pub fn normalize_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut u) => {
            let _ = u.set_scheme(&u.scheme().to_ascii_lowercase());
            if let Some(host) = u.host_str() {
                let host = host.to_ascii_lowercase();
                let _ = u.set_host(Some(&host));
            }
            u.to_string()
        }
        Err(_) => url.to_ascii_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_url_hashes_equal() {
        let a = UrlHash::of("https://Example.com/path?q=1");
        let b = UrlHash::of("https://example.com/path?q=1");
        assert_eq!(a, b);
    }

    #[test]
    fn different_paths_hash_differently() {
        let a = UrlHash::of("https://example.com/a");
        let b = UrlHash::of("https://example.com/b");
        assert_ne!(a, b);
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(QueueItemId::new(), QueueItemId::new());
    }
}
