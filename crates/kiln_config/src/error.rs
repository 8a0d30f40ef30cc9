//! Errors raised while loading `kiln.toml`.

use std::path::PathBuf;

/// Why a build configuration could not be produced.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read '{}': {source}", .path.display())]
    Read {
        /// The file that was read.
        path: PathBuf,
        /// The underlying I/O failure.
        source: std::io::Error,
    },

    /// The TOML text is malformed or has fields of the wrong shape.
    #[error("malformed configuration: {0}")]
    Syntax(#[from] toml::de::Error),

    /// A field that has no default is empty.
    #[error("'{0}' must be set")]
    Missing(&'static str),

    /// A field holds a value the build core cannot use.
    #[error("invalid '{field}': {reason}")]
    Invalid {
        /// Dotted name of the field, e.g. `build.optimization`.
        field: &'static str,
        /// What is wrong with the value.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_names_the_field() {
        let err = ConfigError::invalid("build.optimization", "4 is above 3");
        assert_eq!(err.to_string(), "invalid 'build.optimization': 4 is above 3");
    }

    #[test]
    fn read_error_shows_path() {
        let err = ConfigError::Read {
            path: PathBuf::from("proj/kiln.toml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(err.to_string(), "cannot read 'proj/kiln.toml': no such file");
    }
}
