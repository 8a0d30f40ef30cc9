//! Conformance helpers for the kiln build core.
//!
//! Provides [`ScriptHost`], a small scripted compiler that plugs into the
//! build context as its collaborator, and [`Session`], which owns everything a
//! [`BuildEnv`] borrows so integration tests can drive real on-disk projects.

#![warn(missing_docs)]

pub mod check;
pub mod expr;
pub mod host;
pub mod interp;
pub mod script;

pub use host::ScriptHost;

use kiln_build::{BuildContext, BuildEnv};
use kiln_config::{load_config_from_str, BuildConfig, ConfigError};
use kiln_diagnostics::{Diagnostic, DiagnosticSink};
use kiln_source::VirtualOverlay;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// The prelude used by conformance projects: arithmetic is built in, the
/// exception effect gets its default handler here.
pub const CORE_SOURCE: &str = "\
pub fun default-exn(action) : () { action() }
pub fun answer() : int { 42 }
";

/// An asynchronous-effect module whose default handler prints on entry.
pub const ASYNC_SOURCE: &str = "\
effect async
pub fun default-async(action) : () { println(\"async\"); action() }
";

/// Creates a `BuildConfig` for a conformance project from TOML settings.
pub fn make_config(build_section: &str) -> Result<BuildConfig, ConfigError> {
    let toml_str = format!(
        r#"
[project]
name = "conformance_test"

[build]
{build_section}
"#
    );
    load_config_from_str(&toml_str)
}

/// Writes a source file under `root`, creating directories. Returns its path.
pub fn write_source(root: &Path, relative: &str, content: &str) -> io::Result<PathBuf> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, content)?;
    Ok(path)
}

/// Everything one build session borrows.
pub struct Session {
    /// The build configuration.
    pub config: BuildConfig,
    /// Collected diagnostics.
    pub sink: DiagnosticSink,
    /// The virtual overlay.
    pub overlay: VirtualOverlay,
    /// The scripted compiler.
    pub host: ScriptHost,
}

impl Session {
    /// Creates a session for the project at `root` with default settings.
    pub fn new(root: &Path) -> Self {
        Self::with_config(root, BuildConfig::new("conformance_test"))
    }

    /// Creates a session with an explicit configuration.
    pub fn with_config(root: &Path, config: BuildConfig) -> Self {
        Self {
            config,
            sink: DiagnosticSink::new(),
            overlay: VirtualOverlay::new(),
            host: ScriptHost::new(root),
        }
    }

    /// Returns the environment for build operations.
    pub fn env(&self) -> BuildEnv<'_> {
        BuildEnv::new(&self.config, &self.sink, &self.overlay, &self.host)
    }

    /// Returns an empty context validated against this session's configuration.
    pub fn context(&self) -> BuildContext {
        BuildContext::for_env(&self.env())
    }

    /// Returns every diagnostic reported so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.sink.diagnostics()
    }
}
