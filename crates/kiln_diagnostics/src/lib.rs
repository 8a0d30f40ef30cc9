//! Diagnostic creation, accumulation, and caret-style rendering.
//!
//! Every user-facing failure of the build core (parse, type, unhandled
//! effect, link, and symbol resolution errors) is a [`Diagnostic`] with a
//! categorized [`DiagnosticCode`]. The [`DiagnosticSink`] accumulates them
//! for one build session and the [`TerminalRenderer`] formats them with a
//! caret marker under the offending source.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod renderer;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::{Diagnostic, Severity};
pub use renderer::{DiagnosticRenderer, TerminalRenderer};
pub use sink::DiagnosticSink;
