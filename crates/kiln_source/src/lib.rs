//! Source ranges, source text databases, and the virtual source overlay.
//!
//! This crate provides [`SourceRange`] for locating diagnostics, the
//! [`SourceDb`] that resolves ranges back to source lines (honoring `#line`
//! directives in synthesized files), path normalization helpers, and the
//! scoped [`VirtualOverlay`] that shadows files in memory during interactive
//! evaluation.

#![warn(missing_docs)]

pub mod overlay;
pub mod path;
pub mod range;
pub mod reader;
pub mod source_db;

pub use overlay::{OverlayError, OverlayGuard, VirtualFile, VirtualOverlay};
pub use range::{Pos, SourceRange};
pub use reader::{SourceReader, SourceText};
pub use source_db::{SourceDb, SourceFile};
