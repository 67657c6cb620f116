//! Filesystem-backed persistence for Sunrise Scribe.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use log::{debug, info};

use scribe_core::{CoreError, CoreResult, EntryStore, JournalEntry};
use scribe_utils::write_atomically;

mod autostart;
mod config;
mod format;

pub use autostart::XdgAutostart;
pub use config::{
    default_entries_dir, ConfigReloader, DirectoryConfig, DirectoryOrigin, FsConfigStore,
    ResolvedDirectory, CONFIG_PATH_ENV, FALLBACK_DIR_NAME, STORAGE_DIR_ENV,
};
pub use format::{entry_file_name, long_date, parse_entry, parse_entry_lenient, render_entry};

/// Directory name shared by config, state, and autostart files.
pub const APP_DIR_NAME: &str = "sunrise-scribe";

/// Resolve the per-user state directory (logs, activation requests).
pub fn state_dir() -> CoreResult<PathBuf> {
    if let Some(dir) = dirs::data_local_dir() {
        return Ok(dir.join(APP_DIR_NAME));
    }
    Err(CoreError::ConfigUnavailable(
        "unable to determine a state directory".into(),
    ))
}

/// Entry store keeping one `<YYYY-MM-DD>.txt` file per day.
#[derive(Debug)]
pub struct FsEntryStore {
    directory: DirectoryConfig,
}

impl FsEntryStore {
    /// Create a store that writes wherever `directory` resolves to.
    pub fn new(directory: DirectoryConfig) -> Self {
        Self { directory }
    }

    /// Create a store rooted at a fixed directory.
    pub fn at(root: PathBuf) -> Self {
        Self::new(DirectoryConfig::pinned(root))
    }

    /// The directory configuration backing this store.
    pub fn directory(&self) -> &DirectoryConfig {
        &self.directory
    }

    /// The directory currently holding entries.
    pub fn root(&self) -> PathBuf {
        self.directory.get()
    }

    /// Path of the entry file for a date.
    pub fn entry_path(&self, date: NaiveDate) -> PathBuf {
        self.root().join(entry_file_name(date))
    }

    /// Switch to a new storage directory for all later reads and writes.
    pub fn set_directory(&self, path: &Path) -> CoreResult<()> {
        self.directory.set(path)
    }
}

impl EntryStore for FsEntryStore {
    fn exists(&self, date: NaiveDate) -> bool {
        self.entry_path(date).is_file()
    }

    fn read(&self, date: NaiveDate) -> CoreResult<Option<JournalEntry>> {
        let path = self.entry_path(date);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(CoreError::Io(format!("{}: {err}", path.display()))),
        };
        debug!("event=entry_read path={}", path.display());
        Ok(Some(parse_entry_lenient(date, &contents)))
    }

    fn write(&self, entry: &JournalEntry) -> CoreResult<PathBuf> {
        let path = self.entry_path(entry.date());
        write_atomically(&path, render_entry(entry).as_bytes())
            .map_err(|err| CoreError::Io(format!("{}: {err}", path.display())))?;
        info!("event=entry_saved date={} path={}", entry.date(), path.display());
        Ok(path)
    }
}
