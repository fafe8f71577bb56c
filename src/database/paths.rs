use std::path::{Component, Path, PathBuf};

/// Suffix appended to the document stem to name its storage file
pub const DB_FILE_SUFFIX: &str = "_vec.db";

/// Storage file for a markdown document.
///
/// `{save_path or the document's directory}/{document stem}_vec.db`
#[inline]
pub fn db_path_for(md_file: &Path, save_path: Option<&Path>) -> PathBuf {
    let stem = md_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = format!("{}{}", stem, DB_FILE_SUFFIX);

    match save_path {
        Some(dir) => dir.join(file_name),
        None => match md_file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join(file_name),
            _ => Path::new(".").join(file_name),
        },
    }
}

/// Expand a leading `~` to the user's home directory
#[inline]
pub fn expand_home(path: &Path) -> PathBuf {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => match dirs::home_dir() {
            Some(home) => home.join(components.as_path()),
            None => path.to_path_buf(),
        },
        _ => path.to_path_buf(),
    }
}
