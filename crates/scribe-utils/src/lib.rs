//! Shared helpers and error types for Sunrise Scribe.

use std::fs;
use std::io::Write;
use std::path::Path;

use scribe_core::CoreError;
use thiserror::Error;

pub mod logging;

/// Result type for shared helpers.
pub type UtilsResult<T> = Result<T, UtilsError>;

/// Shared error variants for cross-crate helpers.
#[derive(Debug, Error)]
pub enum UtilsError {
    /// An IO error occurred.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A serialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// A parsing error occurred.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<UtilsError> for CoreError {
    fn from(err: UtilsError) -> Self {
        match err {
            UtilsError::Io(err) => CoreError::Io(err.to_string()),
            UtilsError::Serialization(message) | UtilsError::Parse(message) => CoreError::Io(message),
        }
    }
}

/// Replace `path` with `contents` so readers only ever see the old or the new file.
///
/// The bytes go to a sibling temp file that is synced and then renamed over the target.
pub fn write_atomically(path: &Path, contents: &[u8]) -> UtilsResult<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .ok_or_else(|| UtilsError::Parse(format!("{} has no file name", path.display())))?;
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(file_name);
    tmp_name.push(".tmp");
    let tmp_path = parent.join(tmp_name);

    let result = (|| -> UtilsResult<()> {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}
