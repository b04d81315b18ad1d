//! Deterministic hash-based identity for class objects and functions.
//!
//! [`TypeHash`] is a 64-bit hash computed from script-visible names. Class
//! objects use it as their identity, and free functions use it so they can be
//! passed around as callback values without holding a reference into the
//! registry.
//!
//! Uses XXHash64 with domain-specific mixing constants so that a class and a
//! function sharing a name never collide.
//!
//! # Examples
//!
//! ```
//! use classbind_core::TypeHash;
//!
//! let shape = TypeHash::from_name("Shape");
//! assert_eq!(shape, TypeHash::from_name("Shape"));
//!
//! let upper = TypeHash::from_function("string", "upper");
//! assert_ne!(upper, TypeHash::from_function("", "upper"));
//! ```

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain-specific mixing constants for hash computation.
pub mod hash_constants {
    /// Separator constant for path components (namespace separators)
    pub const SEP: u64 = 0x4bc94d6bd06053ad;

    /// Domain marker for class hashes
    pub const TYPE: u64 = 0x2fac10b63a6cc57c;

    /// Domain marker for free function hashes
    pub const FUNCTION: u64 = 0x5ea77ffbcdf5f302;
}

/// A deterministic 64-bit hash identifying a class object or a function.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Create a class hash from its script-visible name.
    #[inline]
    pub fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::TYPE ^ xxh64(name.as_bytes(), 0))
    }

    /// Create a free-function hash from its namespace and name.
    ///
    /// The root namespace is the empty string.
    #[inline]
    pub fn from_function(namespace: &str, name: &str) -> Self {
        let ns = xxh64(namespace.as_bytes(), 0);
        let hash = (hash_constants::FUNCTION ^ ns)
            .wrapping_mul(hash_constants::SEP)
            .wrapping_add(xxh64(name.as_bytes(), 0));
        TypeHash(hash)
    }

    /// Check if this is an empty/invalid hash.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Get the underlying u64 value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}
