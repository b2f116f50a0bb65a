//! Cache keys stored in image comments

use std::fmt;

/// Prefix marking keys derived from copied content
const COPY_PREFIX: &str = "box:copy";

/// Opaque cache key; the empty key never matches a lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a textual step: `<op-name> <encoded-arguments>`
    pub fn for_step(op: &str, args: &str) -> Self {
        Self(format!("{} {}", op, args))
    }

    /// Key for a copy step from the hex digest of the transferred content
    pub fn for_copy(hex_digest: &str) -> Self {
        Self(format!("{} {}", COPY_PREFIX, hex_digest))
    }

    /// The disabled key, used when caching is bypassed
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
