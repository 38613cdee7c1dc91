use crate::error::Result;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Publish `data` as `dir/file_name`, creating `dir` when missing.
///
/// The bytes go to a hidden temp file in `dir` and are flushed to disk
/// before it is renamed over any previous file of the same name, so a
/// mail job picking up the overview never reads a partial document.
pub fn publish(dir: &Path, file_name: &str, data: &[u8]) -> Result<PathBuf> {
    if file_name.is_empty() || file_name.contains(['/', '\\']) {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("'{file_name}' is not a plain file name"),
        )
        .into());
    }
    std::fs::create_dir_all(dir)?;

    let mut staged = tempfile::Builder::new()
        .prefix(".iim-")
        .suffix(".partial")
        .tempfile_in(dir)?;
    staged.write_all(data)?;
    staged.as_file().sync_all()?;

    let path = dir.join(file_name);
    staged.persist(&path).map_err(|e| e.error)?;
    tracing::debug!(path = %path.display(), bytes = data.len(), "published");
    Ok(path)
}
