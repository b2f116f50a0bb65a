//! Content hashing for cache keys
//!
//! SHA-512/256 over raw bytes only. Paths, permissions and timestamps never
//! enter the digest, so the same content always hashes the same.

use crate::error::{BoxerError, BoxerResult};
use sha2::{Digest, Sha512_256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Incremental content hasher
#[derive(Clone, Default)]
pub struct ContentHasher {
    hasher: Sha512_256,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes into the digest
    pub fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Feed a whole reader into the digest, returning the byte count
    pub fn update_reader<R: Read>(&mut self, mut reader: R) -> io::Result<u64> {
        let mut buf = [0u8; 64 * 1024];
        let mut total = 0u64;
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                return Ok(total);
            }
            self.hasher.update(&buf[..n]);
            total += n as u64;
        }
    }

    /// Finish and return the hex-encoded digest
    pub fn finalize_hex(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

/// Hex digest of a single file's contents
pub fn digest_file(path: &Path) -> BoxerResult<String> {
    let file = File::open(path).map_err(|e| BoxerError::archive(path, e))?;

    let mut hasher = ContentHasher::new();
    hasher
        .update_reader(file)
        .map_err(|e| BoxerError::archive(path, e))?;
    Ok(hasher.finalize_hex())
}
