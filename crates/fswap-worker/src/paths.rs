//! Path confinement for caller-influenced locations.
//!
//! Checks are lexical: `..` components are refused outright, so no
//! filesystem access is needed to decide.

use std::path::{Component, Path, PathBuf};

/// Resolve `candidate` inside `root`.
///
/// Relative paths are joined onto `base` (which must itself lie in `root`);
/// absolute paths must already lie in `root`. Returns `None` for anything
/// that would escape, or that names no file.
pub fn confine(root: &Path, base: &Path, candidate: &str) -> Option<PathBuf> {
    let candidate = Path::new(candidate);

    if candidate
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
    {
        return None;
    }
    candidate.file_name()?;

    let resolved = if candidate.is_absolute() {
        normalize(candidate)
    } else {
        normalize(&base.join(candidate))
    };

    if resolved.starts_with(normalize(root)) && resolved != normalize(root) {
        Some(resolved)
    } else {
        None
    }
}

/// Resolve `candidate` inside the first of `roots` that contains it.
///
/// Relative paths are joined onto `base`.
pub fn confine_any(roots: &[PathBuf], base: &Path, candidate: &str) -> Option<PathBuf> {
    roots
        .iter()
        .find_map(|root| confine(root, base, candidate))
}

/// Drop `.` components.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Whether `path` lies strictly inside `root`.
pub fn is_within(root: &Path, path: &Path) -> bool {
    let root = normalize(root);
    let path = normalize(path);
    path.starts_with(&root) && path != root
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = "/tmp/fswap";
    const JOB: &str = "/tmp/fswap/3f2a";

    #[test]
    fn test_relative_joins_base() {
        assert_eq!(
            confine(Path::new(ROOT), Path::new(JOB), "result.mp4"),
            Some(PathBuf::from("/tmp/fswap/3f2a/result.mp4"))
        );
        assert_eq!(
            confine(Path::new(ROOT), Path::new(JOB), "./out/result.mp4"),
            Some(PathBuf::from("/tmp/fswap/3f2a/out/result.mp4"))
        );
    }

    #[test]
    fn test_absolute_inside_root() {
        assert_eq!(
            confine(Path::new(ROOT), Path::new(JOB), "/tmp/fswap/outputs/a.mp4"),
            Some(PathBuf::from("/tmp/fswap/outputs/a.mp4"))
        );
    }

    #[test]
    fn test_escapes_rejected() {
        let root = Path::new(ROOT);
        let base = Path::new(JOB);
        assert_eq!(confine(root, base, "../../etc/passwd"), None);
        assert_eq!(confine(root, base, "/etc/passwd"), None);
        assert_eq!(confine(root, base, "/tmp/fswap-other/a.mp4"), None);
        assert_eq!(confine(root, base, "/tmp/fswap/"), None);
        assert_eq!(confine(root, base, "/tmp/fswap/a/../../b.mp4"), None);
    }

    #[test]
    fn test_confine_any() {
        let roots = vec![
            PathBuf::from("/workspace/bridge_data/templates"),
            PathBuf::from("/workspace/video"),
        ];
        let base = Path::new("/workspace/bridge_data/templates");

        assert_eq!(
            confine_any(&roots, base, "/workspace/video/1.mp4"),
            Some(PathBuf::from("/workspace/video/1.mp4"))
        );
        assert_eq!(
            confine_any(&roots, base, "intro.mp4"),
            Some(PathBuf::from("/workspace/bridge_data/templates/intro.mp4"))
        );
        assert_eq!(confine_any(&roots, base, "/root/secret.mp4"), None);
    }

    #[test]
    fn test_is_within() {
        assert!(is_within(Path::new(ROOT), Path::new("/tmp/fswap/a/b")));
        assert!(!is_within(Path::new(ROOT), Path::new("/tmp/fswap")));
        assert!(!is_within(Path::new(ROOT), Path::new("/tmp/other")));
    }
}
