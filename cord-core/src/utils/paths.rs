// src/utils/paths.rs
use std::path::{Component, Path, PathBuf};

/// Resolve a path lexically against `base`: absolutize if relative, then
/// collapse `.` and `..` components without touching the filesystem. Scope
/// checks must work for paths that do not exist yet, so canonicalization is
/// not an option here.
pub fn lexical_resolve(path: &str, base: &Path) -> PathBuf {
    let raw = Path::new(path);
    let joined = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        base.join(raw)
    };

    let mut resolved = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other.as_os_str()),
        }
    }
    resolved
}
