//! Shared foundational types used across the kiln build core.
//!
//! This crate provides module and qualified names, content hashing for cache
//! invalidation and configuration fingerprints, and the internal error type.

#![warn(missing_docs)]

pub mod hash;
pub mod name;
pub mod result;

pub use hash::{ContentHash, Fingerprinter};
pub use name::{ModuleName, QualifiedName};
pub use result::{InternalError, KilnResult};
