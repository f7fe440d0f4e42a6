//! Include path resolution

use std::path::{Path, PathBuf};

/// Locate an included file
///
/// Tried in order: an absolute `file` as is; `override_dir/file` when
/// `override_dir` is absolute (nothing else is tried in that case);
/// `parent_dir/override_dir/file`; `parent_dir/file`.
pub fn resolve_include(file: &str, override_dir: Option<&Path>, parent_dir: &Path) -> Option<PathBuf> {
    let file = file.trim();
    if file.is_empty() {
        return None;
    }
    let file = Path::new(file);
    if file.is_absolute() {
        return file.is_file().then(|| file.to_path_buf());
    }

    if let Some(dir) = override_dir {
        if dir.is_absolute() {
            let candidate = dir.join(file);
            return candidate.is_file().then_some(candidate);
        }
        let candidate = parent_dir.join(dir).join(file);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    let candidate = parent_dir.join(file);
    candidate.is_file().then_some(candidate)
}
