use std::path::{Path, PathBuf};

/// Resolves `input` against `base_dir`, falling back to each search directory
/// in order. Absolute paths pass through; when nothing exists the base-relative
/// path is returned so the read error names it.
pub fn resolve_path(base_dir: &Path, search_dirs: &[PathBuf], input: impl AsRef<Path>) -> PathBuf {
    let input = input.as_ref();
    if input.is_absolute() {
        return input.to_path_buf();
    }

    let local = base_dir.join(input);
    if local.exists() {
        return local;
    }

    for dir in search_dirs {
        let candidate = dir.join(input);
        if candidate.exists() {
            return candidate;
        }
    }

    local
}
