//! Module names and fully qualified symbol names.
//!
//! A [`ModuleName`] is a `/`-separated path such as `std/core/types`. It is the
//! primary key for every module lookup in the build cache. A
//! [`QualifiedName`] pairs a module with a local identifier.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// A hierarchical module name, e.g. `std/core` or `app/main`.
///
/// Ordering is lexicographic on the textual form, which gives module lists a
/// stable order independent of resolution order.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct ModuleName(String);

impl ModuleName {
    /// Creates a module name from its textual form.
    ///
    /// Backslashes are normalized to `/` and empty segments are dropped, so
    /// `"std//core/"` and `"std\\core"` both become `std/core`.
    pub fn new(name: impl AsRef<str>) -> Self {
        let segments: Vec<&str> = name
            .as_ref()
            .split(['/', '\\'])
            .filter(|s| !s.is_empty())
            .collect();
        Self(segments.join("/"))
    }

    /// Derives a module name from a source path relative to an include root.
    ///
    /// The extension is stripped and `.`/`..` components are ignored:
    /// `std/core.kk` becomes `std/core`.
    pub fn from_relative_path(path: &Path) -> Self {
        let stem = path.with_extension("");
        let segments: Vec<String> = stem
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        Self(segments.join("/"))
    }

    /// Returns the textual form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the empty module name.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the last segment (`core` for `std/core`).
    pub fn stem(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    /// Returns the enclosing namespace (`std` for `std/core`), if any.
    pub fn parent(&self) -> Option<ModuleName> {
        self.0.rfind('/').map(|idx| ModuleName(self.0[..idx].to_string()))
    }

    /// Returns the relative source path for this module with the given extension.
    pub fn to_relative_path(&self, extension: &str) -> PathBuf {
        let mut path: PathBuf = self.0.split('/').collect();
        path.set_extension(extension);
        path
    }

    /// Qualifies a local identifier with this module.
    pub fn qualify(&self, name: impl Into<String>) -> QualifiedName {
        QualifiedName::new(self.clone(), name)
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleName {
    fn from(name: &str) -> Self {
        ModuleName::new(name)
    }
}

/// A fully qualified symbol name: the defining module plus a local identifier.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct QualifiedName {
    /// The module that defines the symbol.
    pub module: ModuleName,
    /// The local (unqualified) identifier.
    pub name: String,
}

impl QualifiedName {
    /// Creates a qualified name.
    pub fn new(module: ModuleName, name: impl Into<String>) -> Self {
        Self {
            module,
            name: name.into(),
        }
    }

    /// Parses `module/name` or `module.name`.
    ///
    /// The split happens at whichever separator occurs last, so
    /// `std/core/show` is `show` in `std/core`, and `a.f` is `f` in `a`.
    /// Returns `None` when there is no module part or the identifier is empty.
    pub fn parse(text: &str) -> Option<QualifiedName> {
        let idx = text.rfind(['/', '.'])?;
        let (module, name) = (&text[..idx], &text[idx + 1..]);
        if module.is_empty() || name.is_empty() {
            return None;
        }
        Some(QualifiedName::new(ModuleName::new(module), name))
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.module, self.name)
    }
}
