//! The ordered phase lattice every module moves through.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How far a module has progressed through the pipeline.
///
/// Variants are declared in lattice order, so the derived `Ord` is the phase
/// order. Each error variant sorts directly below its successful sibling:
/// when two records of one module are merged, a success at the same step
/// wins over a failure.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Phase {
    /// Known by name only.
    Init,
    /// Source read and scanned; imports are known.
    Loaded,
    /// Parsing failed.
    ParsedError,
    /// Syntax tree available.
    Parsed,
    /// Type checking failed.
    TypedError,
    /// Type checked; core IR and symbol ranges available.
    Typed,
    /// Core IR optimized.
    Optimized,
    /// Backend code generated.
    CodeGen,
    /// Precompiled library interface loaded.
    LibIfaceLoaded,
    /// Linking failed.
    LinkedError,
    /// Linked; an entry point may be available.
    Linked,
}

impl Phase {
    /// All phases in lattice order.
    pub const ALL: [Phase; 11] = [
        Phase::Init,
        Phase::Loaded,
        Phase::ParsedError,
        Phase::Parsed,
        Phase::TypedError,
        Phase::Typed,
        Phase::Optimized,
        Phase::CodeGen,
        Phase::LibIfaceLoaded,
        Phase::LinkedError,
        Phase::Linked,
    ];

    /// Returns `true` for the error sinks of a build cycle.
    pub fn is_error(self) -> bool {
        matches!(
            self,
            Phase::ParsedError | Phase::TypedError | Phase::LinkedError
        )
    }

    /// Returns `true` once type-checked artifacts are available.
    pub fn is_typed(self) -> bool {
        self >= Phase::Typed
    }

    /// Returns the name used in logs and debug output.
    pub fn name(self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Loaded => "loaded",
            Phase::ParsedError => "parsed-error",
            Phase::Parsed => "parsed",
            Phase::TypedError => "typed-error",
            Phase::Typed => "typed",
            Phase::Optimized => "optimized",
            Phase::CodeGen => "codegen",
            Phase::LibIfaceLoaded => "lib-iface-loaded",
            Phase::LinkedError => "linked-error",
            Phase::Linked => "linked",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
