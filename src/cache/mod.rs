//! Content-addressed step caching
//!
//! Every committed image carries a cache key in its comment field. A later
//! build consults the children of its current image for a matching key and
//! adopts the match instead of re-running the step.
//!
//! # Key Forms
//!
//! | Step | Key |
//! |------|-----|
//! | textual (`run`, `env`, ...) | `<op-name> <json-arguments>` |
//! | `copy` | `box:copy <hex-digest>` |
//!
//! Two steps with the same operation and arguments always produce the same
//! key. Arguments are JSON-encoded so that `["a b"]` and `["a", "b"]` never
//! collide.

pub mod archive;
pub mod digest;
pub mod key;

pub use archive::{extract_file, pack_path, PackedArchive};
pub use digest::{digest_file, ContentHasher};
pub use key::CacheKey;
