//! Content hashing for cache invalidation and configuration fingerprints.

use serde::{Deserialize, Serialize};
use std::fmt;
use xxhash_rust::xxh3::Xxh3;

/// A 128-bit content hash computed using XXH3.
///
/// Used both for source content and for the configuration fingerprint that
/// decides whether cached build artifacts are still valid.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// The hash of nothing; a context created before any configuration was seen.
    pub const ZERO: ContentHash = ContentHash([0; 16]);

    /// Computes a content hash from a byte slice using XXH3-128.
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = xxhash_rust::xxh3::xxh3_128(data);
        Self(hash.to_le_bytes())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

/// Incremental hasher over labelled fields.
///
/// Every field is written as `label`, length, bytes so that adjacent fields
/// can never be confused (`["ab", "c"]` and `["a", "bc"]` hash differently).
pub struct Fingerprinter {
    state: Xxh3,
}

impl Fingerprinter {
    /// Creates an empty fingerprinter.
    pub fn new() -> Self {
        Self { state: Xxh3::new() }
    }

    /// Adds a raw byte field.
    pub fn bytes(&mut self, label: &str, value: &[u8]) -> &mut Self {
        self.write_chunk(label.as_bytes());
        self.write_chunk(value);
        self
    }

    /// Adds a string field.
    pub fn str(&mut self, label: &str, value: &str) -> &mut Self {
        self.bytes(label, value.as_bytes())
    }

    /// Adds an integer field.
    pub fn u64(&mut self, label: &str, value: u64) -> &mut Self {
        self.bytes(label, &value.to_le_bytes())
    }

    /// Adds a boolean field.
    pub fn bool(&mut self, label: &str, value: bool) -> &mut Self {
        self.bytes(label, &[u8::from(value)])
    }

    /// Adds an ordered list of strings as a single field.
    pub fn list<S: AsRef<str>>(&mut self, label: &str, values: &[S]) -> &mut Self {
        self.u64(label, values.len() as u64);
        for value in values {
            self.write_chunk(value.as_ref().as_bytes());
        }
        self
    }

    /// Finishes hashing and returns the fingerprint.
    pub fn finish(&self) -> ContentHash {
        ContentHash(self.state.digest128().to_le_bytes())
    }

    fn write_chunk(&mut self, chunk: &[u8]) {
        self.state.update(&(chunk.len() as u64).to_le_bytes());
        self.state.update(chunk);
    }
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new()
    }
}
