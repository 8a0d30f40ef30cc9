//! Path normalization and the virtual mount.
//!
//! Paths are compared lexically after normalization: `.` components are
//! dropped, `..` pops the previous normal component, and separators are
//! unified. No filesystem access happens here, so virtual paths normalize the
//! same way as real ones.

use std::path::{Component, Path, PathBuf};

/// Default mount point for virtual (in-memory) source files.
pub const DEFAULT_VIRTUAL_MOUNT: &str = "/@virtual";

/// Lexically normalizes a path.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Returns `true` if two paths are equal after normalization.
pub fn same_path(a: &Path, b: &Path) -> bool {
    normalize(a) == normalize(b)
}

/// Returns `true` if `path` lies under the virtual mount.
pub fn is_virtual(path: &Path, mount: &Path) -> bool {
    normalize(path).starts_with(normalize(mount))
}

/// Builds a path under the virtual mount: `<mount>/<dir>/<basename>.<ext>`.
///
/// `dir` is usually the directory of a real module's relative source path,
/// so diagnostics for the synthetic file appear next to real code.
pub fn virtual_path(mount: &Path, dir: &Path, basename: &str, extension: &str) -> PathBuf {
    let mut path = normalize(&mount.join(dir));
    path.push(basename);
    path.set_extension(extension);
    path
}

/// Strips `root` from `path`, if `path` lies under it.
pub fn relative_to(path: &Path, root: &Path) -> Option<PathBuf> {
    normalize(path)
        .strip_prefix(normalize(root))
        .ok()
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_current_dir() {
        assert_eq!(normalize(Path::new("./src/./a.kk")), PathBuf::from("src/a.kk"));
    }

    #[test]
    fn resolves_parent_dir() {
        assert_eq!(normalize(Path::new("src/lib/../a.kk")), PathBuf::from("src/a.kk"));
    }

    #[test]
    fn keeps_leading_parent_dirs() {
        assert_eq!(normalize(Path::new("../x/a.kk")), PathBuf::from("../x/a.kk"));
    }

    #[test]
    fn parent_of_root_stays_at_root() {
        assert_eq!(normalize(Path::new("/../a.kk")), PathBuf::from("/a.kk"));
    }

    #[test]
    fn same_path_ignores_noise() {
        assert!(same_path(Path::new("a/./b.kk"), Path::new("a/c/../b.kk")));
        assert!(!same_path(Path::new("a/b.kk"), Path::new("b.kk")));
    }

    #[test]
    fn virtual_paths() {
        let mount = Path::new(DEFAULT_VIRTUAL_MOUNT);
        let p = virtual_path(mount, Path::new("app"), "@interactive", "kk");
        assert_eq!(p, PathBuf::from("/@virtual/app/@interactive.kk"));
        assert!(is_virtual(&p, mount));
        assert!(!is_virtual(Path::new("/src/app.kk"), mount));
    }

    #[test]
    fn virtual_path_with_empty_dir() {
        let p = virtual_path(Path::new("/@virtual"), Path::new(""), "@interactive", "kk");
        assert_eq!(p, PathBuf::from("/@virtual/@interactive.kk"));
    }

    #[test]
    fn relative_to_root() {
        let rel = relative_to(Path::new("/proj/src/./a/b.kk"), Path::new("/proj/src"));
        assert_eq!(rel, Some(PathBuf::from("a/b.kk")));
        assert_eq!(relative_to(Path::new("/other/b.kk"), Path::new("/proj")), None);
    }
}
