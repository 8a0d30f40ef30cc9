//! The error type of fallible build-context operations.

use kiln_common::{InternalError, ModuleName};
use kiln_diagnostics::Diagnostic;
use kiln_source::OverlayError;
use std::path::PathBuf;

/// Result alias for build-context operations.
pub type BuildResult<T> = Result<T, BuildError>;

/// Failures that stop a build-context operation.
///
/// User mistakes in source code are not errors here: they live on modules in
/// error phases and reach the caller as diagnostics. `BuildError` covers what
/// leaves the context unable to continue the current operation.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A source path could not be resolved to a module.
    #[error("cannot resolve source '{}': {reason}", .path.display())]
    ResolveSource {
        /// The path that was requested.
        path: PathBuf,
        /// Why resolution failed.
        reason: String,
    },

    /// A module name could not be found on the search path.
    #[error("cannot find module '{name}': {reason}")]
    ResolveModule {
        /// The module that was requested.
        name: ModuleName,
        /// Why resolution failed.
        reason: String,
    },

    /// A symbol lookup found no match or more than one.
    #[error("{}", .0.message)]
    Unresolved(Box<Diagnostic>),

    /// A collaborator failed outside of reporting user diagnostics.
    #[error("{stage} failed: {message}")]
    Collaborator {
        /// The collaborator step, e.g. `type check`.
        stage: &'static str,
        /// The failure message.
        message: String,
    },

    /// The virtual overlay could not be installed.
    #[error(transparent)]
    Overlay(#[from] OverlayError),

    /// The context holds modules in error phases.
    #[error("build failed with {} error(s)", .diagnostics.len())]
    Failed {
        /// Every error diagnostic in the context.
        diagnostics: Vec<Diagnostic>,
    },

    /// A linked program reported failure.
    #[error("program failed: {0}")]
    Run(String),

    /// A broken invariant inside the build core.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl BuildError {
    /// Creates a collaborator failure.
    pub fn collaborator(stage: &'static str, message: impl Into<String>) -> Self {
        BuildError::Collaborator {
            stage,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_diagnostics::{Category, DiagnosticCode};

    #[test]
    fn display_resolve_source() {
        let err = BuildError::ResolveSource {
            path: PathBuf::from("src/a.kk"),
            reason: "file not found".into(),
        };
        assert_eq!(err.to_string(), "cannot resolve source 'src/a.kk': file not found");
    }

    #[test]
    fn display_failed() {
        let diag = Diagnostic::error(DiagnosticCode::new(Category::Type, 201), "bad");
        let err = BuildError::Failed {
            diagnostics: vec![diag.clone(), diag],
        };
        assert_eq!(err.to_string(), "build failed with 2 error(s)");
    }

    #[test]
    fn display_unresolved_uses_message() {
        let diag = Diagnostic::error(DiagnosticCode::new(Category::Resolve, 501), "unknown symbol 'f'");
        assert_eq!(
            BuildError::Unresolved(Box::new(diag)).to_string(),
            "unknown symbol 'f'"
        );
    }

    #[test]
    fn from_internal_and_overlay() {
        let err: BuildError = InternalError::new("oops").into();
        assert!(matches!(err, BuildError::Internal(_)));
        let err: BuildError = OverlayError::AlreadyInstalled {
            path: PathBuf::from("/@virtual/x.kk"),
        }
        .into();
        assert!(err.to_string().contains("already installed"));
        assert_eq!(
            BuildError::collaborator("type check", "host crashed").to_string(),
            "type check failed: host crashed"
        );
    }
}
