//! Resource Key Module
//!
//! Identifies a requested resource at a specific rendition and derives the
//! content hash used to name its file in the disk tier.

use std::fmt;
use std::hash::{Hash, Hasher};

use sha2::{Digest, Sha256};

// == Size Hint ==
/// Target rendition size passed to the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SizeHint {
    pub width: u32,
    pub height: u32,
}

impl SizeHint {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Variant qualifier appended to the address, e.g. `120x80`.
    pub fn variant(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

// == Resource Key ==
/// Full identifier of a cached resource: its fetch address plus an optional
/// variant qualifier.
///
/// Equality and hashing consider only the full key string, so two keys that
/// differ only in their variant are distinct entries.
#[derive(Debug, Clone)]
pub struct ResourceKey {
    /// Address handed to the fetcher
    address: String,
    /// Cache and coalescing key (address + variant)
    key: String,
}

impl ResourceKey {
    // == Constructors ==
    /// Key for the unqualified resource at `address`.
    pub fn new(address: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            key: address.clone(),
            address,
        }
    }

    /// Key for a specific variant of the resource at `address`.
    pub fn with_variant(address: impl Into<String>, variant: &str) -> Self {
        let address = address.into();
        Self {
            key: format!("{}_{}", address, variant),
            address,
        }
    }

    /// Key for a resolve request, qualified by the size hint when present.
    pub fn for_request(address: impl Into<String>, size_hint: Option<SizeHint>) -> Self {
        match size_hint {
            Some(hint) => Self::with_variant(address, &hint.variant()),
            None => Self::new(address),
        }
    }

    // == Accessors ==
    /// Underlying address without the variant qualifier.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Full key string.
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Hex-encoded SHA-256 of the full key, used as the disk file name.
    pub fn content_hash(&self) -> String {
        content_hash(&self.key)
    }
}

impl PartialEq for ResourceKey {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ResourceKey {}

impl Hash for ResourceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

// == Content Hash ==
/// Hex-encoded SHA-256 digest of the key's UTF-8 bytes.
///
/// Deterministic and unsalted, so every store instance pointed at the same
/// directory resolves a key to the same file.
pub fn content_hash(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}
