//! Configuration types deserialized from `kiln.toml`.

use kiln_common::{ContentHash, Fingerprinter};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Version of the compiler core, mixed into every configuration fingerprint
/// so artifacts produced by another version are never reused.
pub const COMPILER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The top-level build configuration parsed from `kiln.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    /// Project metadata.
    pub project: ProjectMeta,
    /// Build settings.
    #[serde(default)]
    pub build: BuildSettings,
    /// Backend compiler settings.
    #[serde(default)]
    pub codegen: CodegenSettings,
}

/// Project metadata. Not part of the fingerprint.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
}

/// The code generation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Native code via a C compiler.
    #[default]
    C,
    /// JavaScript.
    Js,
    /// WebAssembly.
    Wasm,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::C => write!(f, "c"),
            Target::Js => write!(f, "js"),
            Target::Wasm => write!(f, "wasm"),
        }
    }
}

/// Settings under `[build]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Backend target.
    pub target: Target,
    /// Optimization level, `0..=3`.
    pub optimization: u8,
    /// Whether to emit debug information.
    pub debug: bool,
    /// Directory for interface files, libraries, and executables.
    pub output_dir: PathBuf,
    /// Search path for module-name resolution, in priority order.
    pub include: Vec<PathBuf>,
    /// Extension of source files, without the dot.
    pub source_extension: String,
    /// Mount point of in-memory virtual modules.
    pub virtual_mount: PathBuf,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            target: Target::C,
            optimization: 0,
            debug: true,
            output_dir: PathBuf::from(".kiln"),
            include: Vec::new(),
            source_extension: "kk".to_string(),
            virtual_mount: PathBuf::from("/@virtual"),
        }
    }
}

/// Settings under `[codegen]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CodegenSettings {
    /// The C compiler executable.
    pub cc: String,
    /// Extra flags passed to the C compiler.
    pub cc_flags: Vec<String>,
}

impl Default for CodegenSettings {
    fn default() -> Self {
        Self {
            cc: "cc".to_string(),
            cc_flags: Vec::new(),
        }
    }
}

impl BuildConfig {
    /// Creates a configuration with default settings for a named project.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            project: ProjectMeta { name: name.into() },
            build: BuildSettings::default(),
            codegen: CodegenSettings::default(),
        }
    }

    /// Hashes every setting that affects generated artifacts.
    ///
    /// Two configurations with equal fingerprints may share cached modules.
    /// `project.name` is excluded.
    pub fn fingerprint(&self) -> ContentHash {
        let mut fp = Fingerprinter::new();
        fp.str("compiler", COMPILER_VERSION)
            .str("target", &self.build.target.to_string())
            .u64("optimization", u64::from(self.build.optimization))
            .bool("debug", self.build.debug)
            .str("output_dir", &path_text(&self.build.output_dir))
            .list(
                "include",
                &self.build.include.iter().map(|p| path_text(p)).collect::<Vec<_>>(),
            )
            .str("source_extension", &self.build.source_extension)
            .str("cc", &self.codegen.cc)
            .list("cc_flags", &self.codegen.cc_flags);
        fp.finish()
    }
}

fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = BuildConfig::new("demo");
        assert_eq!(config.build.target, Target::C);
        assert_eq!(config.build.source_extension, "kk");
        assert_eq!(config.build.virtual_mount, PathBuf::from("/@virtual"));
        assert_eq!(config.codegen.cc, "cc");
    }

    #[test]
    fn fingerprint_ignores_project_name() {
        let a = BuildConfig::new("one");
        let b = BuildConfig::new("two");
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_tracks_artifact_settings() {
        let base = BuildConfig::new("demo");
        let mut opt = base.clone();
        opt.build.optimization = 2;
        let mut target = base.clone();
        target.build.target = Target::Js;
        let mut flags = base.clone();
        flags.codegen.cc_flags.push("-O2".to_string());
        let mut include = base.clone();
        include.build.include.push(PathBuf::from("lib"));

        let fp = base.fingerprint();
        assert_ne!(fp, opt.fingerprint());
        assert_ne!(fp, target.fingerprint());
        assert_ne!(fp, flags.fingerprint());
        assert_ne!(fp, include.fingerprint());
    }

    #[test]
    fn fingerprint_is_deterministic() {
        assert_eq!(
            BuildConfig::new("demo").fingerprint(),
            BuildConfig::new("demo").fingerprint()
        );
    }

    #[test]
    fn target_display() {
        assert_eq!(Target::Wasm.to_string(), "wasm");
    }
}
