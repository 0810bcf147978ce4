//! Watched identities and the registry that resolves raw platform keys to them.

use crate::error::{Result, WatchError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// A canonical watched entity drawn from a fixed, closed set.
///
/// `key()` is the raw string the platform layer uses to name it.
pub trait Identity: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {
    fn key(&self) -> &str;
}

/// Known versions of the watched photo application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppVersion {
    V3,
    V4,
    V5,
}

impl AppVersion {
    pub const ALL: [AppVersion; 3] = [AppVersion::V3, AppVersion::V4, AppVersion::V5];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppVersion::V3 => "com.adobe.Lightroom3",
            AppVersion::V4 => "com.adobe.Lightroom4",
            AppVersion::V5 => "com.adobe.Lightroom5",
        }
    }

    /// Registry over every known version.
    pub fn registry() -> Result<IdentityRegistry<AppVersion>> {
        IdentityRegistry::from_identities(Self::ALL)
    }
}

impl Identity for AppVersion {
    fn key(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for AppVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Read-only mapping from raw platform key to identity.
///
/// Built once; lookups need no locking.
#[derive(Debug, Clone)]
pub struct IdentityRegistry<I: Identity> {
    /// Configured `(key, identity)` pairs in table order.
    entries: Vec<(String, I)>,
    by_key: HashMap<String, I>,
}

impl<I: Identity> IdentityRegistry<I> {
    /// Build a registry from an explicit `(key, identity)` table.
    ///
    /// Fails with `DuplicateKey` if two entries share a raw key.
    pub fn new<K, T>(table: T) -> Result<Self>
    where
        K: Into<String>,
        T: IntoIterator<Item = (K, I)>,
    {
        let mut entries = Vec::new();
        let mut by_key = HashMap::new();

        for (key, identity) in table {
            let key = key.into();
            if by_key.contains_key(&key) {
                return Err(WatchError::DuplicateKey { key });
            }
            by_key.insert(key.clone(), identity.clone());
            entries.push((key, identity));
        }

        Ok(Self { entries, by_key })
    }

    /// Build a registry keyed by each identity's own `key()`.
    pub fn from_identities(identities: impl IntoIterator<Item = I>) -> Result<Self> {
        Self::new(
            identities
                .into_iter()
                .map(|identity| (identity.key().to_string(), identity)),
        )
    }

    /// Resolve a raw key to its identity.
    pub fn resolve(&self, raw_key: &str) -> Result<I> {
        self.by_key
            .get(raw_key)
            .cloned()
            .ok_or_else(|| WatchError::UnknownIdentity {
                key: raw_key.to_string(),
            })
    }

    /// Whether the raw key is configured.
    pub fn contains(&self, raw_key: &str) -> bool {
        self.by_key.contains_key(raw_key)
    }

    /// First configured raw key for an identity.
    pub fn key_for(&self, identity: &I) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, candidate)| candidate == identity)
            .map(|(key, _)| key.as_str())
    }

    /// Configured `(key, identity)` pairs in table order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &I)> {
        self.entries.iter().map(|(key, identity)| (key.as_str(), identity))
    }

    /// Distinct identities in table order.
    pub fn identities(&self) -> Vec<I> {
        let mut seen = Vec::with_capacity(self.entries.len());
        for (_, identity) in &self.entries {
            if !seen.contains(identity) {
                seen.push(identity.clone());
            }
        }
        seen
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
