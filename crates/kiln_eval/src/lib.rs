//! Interactive evaluation on top of the build context.
//!
//! An expression typed at a prompt becomes a synthetic module under the
//! virtual mount. The module is type checked like any other root; its
//! inferred effects are discharged with default handlers; and a generated
//! `main` is built into a runnable entry point.

#![warn(missing_docs)]

pub mod errors;
pub mod handlers;
pub mod pipeline;
pub mod synth;
pub mod virtual_module;

pub use handlers::{default_handler_name, wrap_default_handlers, Wrapped};
pub use pipeline::{compile_entry, compile_expr, run_entry, run_expr, CompileOptions, Compiled};
pub use synth::Presentation;
pub use virtual_module::with_virtual_module;
