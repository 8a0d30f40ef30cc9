//! The explicit environment every build operation runs in.

use crate::host::BuildHost;
use kiln_common::ContentHash;
use kiln_config::BuildConfig;
use kiln_diagnostics::DiagnosticSink;
use kiln_source::{SourceReader, VirtualOverlay};
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Configuration, diagnostics, source access and collaborators for one session.
///
/// Passed by reference into every context operation instead of living in
/// global state.
#[derive(Clone, Copy)]
pub struct BuildEnv<'a> {
    /// The active build configuration.
    pub config: &'a BuildConfig,
    /// Where diagnostics are reported.
    pub sink: &'a DiagnosticSink,
    /// The in-memory source shadow.
    pub overlay: &'a VirtualOverlay,
    /// The compiler collaborators.
    pub host: &'a dyn BuildHost,
}

impl<'a> BuildEnv<'a> {
    /// Creates an environment.
    pub fn new(
        config: &'a BuildConfig,
        sink: &'a DiagnosticSink,
        overlay: &'a VirtualOverlay,
        host: &'a dyn BuildHost,
    ) -> Self {
        Self {
            config,
            sink,
            overlay,
            host,
        }
    }

    /// Returns a reader that sees the overlay before the file system.
    pub fn reader(&self) -> SourceReader<'a> {
        SourceReader::new(self.overlay)
    }

    /// Returns the fingerprint of the active configuration.
    pub fn fingerprint(&self) -> ContentHash {
        self.config.fingerprint()
    }

    /// Returns the mount point of virtual modules.
    pub fn virtual_mount(&self) -> &'a Path {
        &self.config.build.virtual_mount
    }

    /// Returns the source file extension.
    pub fn source_extension(&self) -> &'a str {
        &self.config.build.source_extension
    }

    /// Runs `f` inside a named phase span and logs its duration.
    pub fn timed<T>(&self, phase: &str, f: impl FnOnce() -> T) -> T {
        let span = tracing::info_span!("phase", name = phase);
        let _entered = span.enter();
        let start = Instant::now();
        let out = f();
        info!(
            phase,
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "phase finished"
        );
        out
    }
}

impl std::fmt::Debug for BuildEnv<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildEnv")
            .field("fingerprint", &self.fingerprint())
            .finish_non_exhaustive()
    }
}
