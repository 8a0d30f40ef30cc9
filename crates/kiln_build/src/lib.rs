//! The incremental build core.
//!
//! Modules move through an ordered [`Phase`] lattice, each phase carrying its
//! own artifacts ([`ModuleState`]). A [`BuildContext`] keeps a cache of modules
//! consistent with a changing set of roots and configuration, delegating the
//! actual compiler work to a [`BuildHost`]. Symbol tables are exposed as
//! composable [`Definitions`].

#![warn(missing_docs)]

pub mod artifact;
pub mod cache;
pub mod context;
pub mod definitions;
pub mod env;
pub mod error;
pub mod errors;
pub mod host;
pub mod ir;
pub mod module;
pub mod phase;
pub mod types;

pub use artifact::{Entry, Import, InlineDef, Inlines, Lexeme, Program, RangeEntry, RangeMap, SyntaxDecl};
pub use cache::ModuleCache;
pub use context::BuildContext;
pub use definitions::{Definitions, SymbolInfo};
pub use env::BuildEnv;
pub use error::{BuildError, BuildResult};
pub use host::{BuildHost, FoundSource};
pub use ir::{CoreProgram, Visibility, ValueSort};
pub use module::{
    merge_modules, Failed, LinkedUnit, LoadedUnit, Module, ModulePaths, ModuleState, ParsedUnit,
    Stamped, TypedUnit,
};
pub use phase::Phase;
pub use types::Type;
