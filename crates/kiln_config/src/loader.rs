//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::BuildConfig;
use std::path::Path;

/// File name of the build configuration inside a project directory.
pub const CONFIG_FILE: &str = "kiln.toml";

/// Loads and validates a `kiln.toml` configuration from a project directory.
pub fn load_config(project_dir: &Path) -> Result<BuildConfig, ConfigError> {
    let path = project_dir.join(CONFIG_FILE);
    let content =
        std::fs::read_to_string(&path).map_err(|source| ConfigError::Read { path, source })?;
    load_config_from_str(&content)
}

/// Parses and validates a `kiln.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<BuildConfig, ConfigError> {
    let config: BuildConfig = toml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates required fields and value ranges.
pub fn validate_config(config: &BuildConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::Missing("project.name"));
    }
    if config.build.optimization > 3 {
        return Err(ConfigError::invalid(
            "build.optimization",
            format!("level {} is out of range 0..=3", config.build.optimization),
        ));
    }
    if config.build.source_extension.is_empty() || config.build.source_extension.contains('.') {
        return Err(ConfigError::invalid(
            "build.source_extension",
            format!("'{}' is not a bare extension", config.build.source_extension),
        ));
    }
    if !config.build.virtual_mount.is_absolute() {
        return Err(ConfigError::invalid(
            "build.virtual_mount",
            format!("'{}' is not absolute", config.build.virtual_mount.display()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Target;
    use std::path::PathBuf;

    #[test]
    fn parse_minimal_config() {
        let config = load_config_from_str("[project]\nname = \"demo\"\n").unwrap();
        assert_eq!(config.project.name, "demo");
        assert_eq!(config.build.optimization, 0);
        assert!(config.build.include.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[project]
name = "demo"

[build]
target = "js"
optimization = 2
debug = false
output_dir = "out"
include = ["src", "lib"]

[codegen]
cc = "clang"
cc_flags = ["-O2", "-g"]
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.build.target, Target::Js);
        assert_eq!(config.build.optimization, 2);
        assert!(!config.build.debug);
        assert_eq!(config.build.output_dir, PathBuf::from("out"));
        assert_eq!(config.build.include.len(), 2);
        assert_eq!(config.codegen.cc, "clang");
        assert_eq!(config.codegen.cc_flags, vec!["-O2", "-g"]);
    }

    #[test]
    fn missing_name_errors() {
        let err = load_config_from_str("[project]\nname = \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Missing("project.name")));
    }

    #[test]
    fn optimization_out_of_range() {
        let toml = "[project]\nname = \"x\"\n[build]\noptimization = 4\n";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "build.optimization",
                ..
            }
        ));
    }

    #[test]
    fn unknown_target_is_parse_error() {
        let toml = "[project]\nname = \"x\"\n[build]\ntarget = \"jvm\"\n";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Syntax(_)));
    }

    #[test]
    fn relative_mount_rejected() {
        let toml = "[project]\nname = \"x\"\n[build]\nvirtual_mount = \"virt\"\n";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::Syntax(_)));
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[project]\nname = \"disk\"\n").unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.project.name, "disk");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains(CONFIG_FILE));
    }
}
