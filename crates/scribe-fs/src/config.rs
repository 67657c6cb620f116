//! Persisted preferences and storage directory resolution.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::{debug, info, warn};

use scribe_core::{Configuration, CoreError, CoreResult};
use scribe_utils::write_atomically;

use crate::APP_DIR_NAME;

const CONFIG_FILE_NAME: &str = "config.yaml";

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "SUNRISE_SCRIBE_CONFIG";

/// Environment variable overriding the storage directory.
pub const STORAGE_DIR_ENV: &str = "SUNRISE_SCRIBE_DIR";

/// Directory name used when no storage location is configured.
pub const FALLBACK_DIR_NAME: &str = "JournalEntries";

/// YAML-backed key/value store for [`Configuration`].
#[derive(Debug, Clone)]
pub struct FsConfigStore {
    path: PathBuf,
}

impl FsConfigStore {
    /// Create a store backed by the given file.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Open the store at its default location.
    pub fn open_default() -> CoreResult<Self> {
        Ok(Self::new(Self::default_path()?))
    }

    /// Resolve the default config path (`<config dir>/sunrise-scribe/config.yaml`).
    pub fn default_path() -> CoreResult<PathBuf> {
        if let Ok(value) = std::env::var(CONFIG_PATH_ENV) {
            if !value.trim().is_empty() {
                return Ok(PathBuf::from(value));
            }
        }
        if let Some(dir) = dirs::config_dir() {
            return Ok(dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME));
        }
        Err(CoreError::ConfigUnavailable(
            "unable to determine config directory".into(),
        ))
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored configuration. A missing file yields the defaults.
    pub fn load(&self) -> CoreResult<Configuration> {
        if !self.path.exists() {
            return Ok(Configuration::default());
        }
        let contents =
            fs::read_to_string(&self.path).map_err(|err| CoreError::Io(err.to_string()))?;
        if contents.trim().is_empty() {
            return Ok(Configuration::default());
        }
        serde_yaml::from_str(&contents).map_err(|err| CoreError::ConfigUnavailable(err.to_string()))
    }

    /// Load the stored configuration, using defaults when it cannot be read.
    pub fn load_or_default(&self) -> Configuration {
        self.load().unwrap_or_else(|err| {
            warn!(
                "event=config_load_failed path={} reason=\"{err}\" fallback=defaults",
                self.path.display()
            );
            Configuration::default()
        })
    }

    /// Persist the configuration.
    pub fn save(&self, config: &Configuration) -> CoreResult<()> {
        let contents =
            serde_yaml::to_string(config).map_err(|err| CoreError::Io(err.to_string()))?;
        write_atomically(&self.path, contents.as_bytes())?;
        Ok(())
    }

    /// Load, modify, and persist the configuration in one step.
    pub fn update(&self, change: impl FnOnce(&mut Configuration)) -> CoreResult<Configuration> {
        let mut config = self.load_or_default();
        change(&mut config);
        self.save(&config)?;
        Ok(config)
    }
}

/// Detects changes to the config file made by other processes.
#[derive(Debug)]
pub struct ConfigReloader {
    store: FsConfigStore,
    seen: Option<(SystemTime, u64)>,
}

impl ConfigReloader {
    /// Start watching, treating the current file state as already seen.
    pub fn new(store: FsConfigStore) -> Self {
        let seen = file_signature(store.path());
        Self { store, seen }
    }

    /// Return the freshly loaded configuration if the file changed since the last call.
    pub fn reload_if_changed(&mut self) -> CoreResult<Option<Configuration>> {
        let current = file_signature(self.store.path());
        if current == self.seen {
            return Ok(None);
        }
        self.seen = current;
        let config = self.store.load()?;
        info!("event=config_reloaded path={}", self.store.path().display());
        Ok(Some(config))
    }
}

fn file_signature(path: &Path) -> Option<(SystemTime, u64)> {
    let meta = fs::metadata(path).ok()?;
    Some((meta.modified().ok()?, meta.len()))
}

/// Where the resolved storage directory came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DirectoryOrigin {
    /// `SUNRISE_SCRIBE_DIR` was set.
    Environment,
    /// The directory chosen by the user.
    Configured,
    /// The default location, with the reason when a choice had to be dropped.
    Fallback(Option<String>),
}

/// A storage directory together with how it was chosen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedDirectory {
    pub path: PathBuf,
    pub origin: DirectoryOrigin,
}

/// Resolves and persists the directory that holds entry files.
///
/// Resolution is lazy and cached for the life of the value; [`DirectoryConfig::set`]
/// replaces the cached result immediately.
#[derive(Debug)]
pub struct DirectoryConfig {
    config: Option<FsConfigStore>,
    env_override: Option<PathBuf>,
    fallback: PathBuf,
    cached: RefCell<Option<ResolvedDirectory>>,
}

impl DirectoryConfig {
    /// Resolve through the environment, then `config`, then `~/JournalEntries`.
    pub fn new(config: FsConfigStore) -> Self {
        let env_override = std::env::var(STORAGE_DIR_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);
        Self {
            config: Some(config),
            env_override,
            fallback: default_entries_dir(),
            cached: RefCell::new(None),
        }
    }

    /// Resolve through `config` only, falling back to `fallback`.
    pub fn with_fallback(config: FsConfigStore, fallback: PathBuf) -> Self {
        Self {
            config: Some(config),
            env_override: None,
            fallback,
            cached: RefCell::new(None),
        }
    }

    /// Always use `path`; nothing is persisted.
    pub fn pinned(path: PathBuf) -> Self {
        Self {
            config: None,
            env_override: None,
            fallback: path.clone(),
            cached: RefCell::new(Some(ResolvedDirectory {
                path,
                origin: DirectoryOrigin::Configured,
            })),
        }
    }

    /// The directory entries are read from and written to.
    pub fn get(&self) -> PathBuf {
        self.resolved().path
    }

    /// The full resolution result, resolving on first use.
    pub fn resolved(&self) -> ResolvedDirectory {
        if let Some(resolved) = self.cached.borrow().as_ref() {
            return resolved.clone();
        }
        let resolved = self.resolve();
        info!(
            "event=storage_dir_resolved path={} origin={:?}",
            resolved.path.display(),
            resolved.origin
        );
        *self.cached.borrow_mut() = Some(resolved.clone());
        resolved
    }

    /// A message for the user when the chosen location could not be used.
    pub fn notice(&self) -> Option<String> {
        match self.resolved().origin {
            DirectoryOrigin::Fallback(Some(reason)) => Some(format!(
                "{reason}; entries are saved to {} instead",
                self.fallback.display()
            )),
            _ => None,
        }
    }

    /// Persist a new storage directory. Existing entries stay where they are.
    pub fn set(&self, path: &Path) -> CoreResult<()> {
        check_accessible(path)?;
        if let Some(config) = &self.config {
            config.update(|config| config.storage_directory = Some(path.to_path_buf()))?;
        }
        info!("event=storage_dir_changed path={}", path.display());
        *self.cached.borrow_mut() = Some(ResolvedDirectory {
            path: path.to_path_buf(),
            origin: DirectoryOrigin::Configured,
        });
        Ok(())
    }

    /// Forget the cached resolution so the next lookup re-reads the config.
    pub fn invalidate(&self) {
        if self.config.is_some() {
            self.cached.borrow_mut().take();
        }
    }

    fn resolve(&self) -> ResolvedDirectory {
        if let Some(path) = &self.env_override {
            match check_accessible(path) {
                Ok(()) => {
                    return ResolvedDirectory {
                        path: path.clone(),
                        origin: DirectoryOrigin::Environment,
                    }
                }
                Err(err) => return self.fall_back(Some(err)),
            }
        }

        let configured = match &self.config {
            Some(store) => match store.load() {
                Ok(config) => config.storage_directory,
                Err(err) => return self.fall_back(Some(err)),
            },
            None => None,
        };

        match configured {
            Some(path) => match check_accessible(&path) {
                Ok(()) => ResolvedDirectory {
                    path,
                    origin: DirectoryOrigin::Configured,
                },
                Err(err) => self.fall_back(Some(err)),
            },
            None => self.fall_back(None),
        }
    }

    fn fall_back(&self, reason: Option<CoreError>) -> ResolvedDirectory {
        if let Some(reason) = &reason {
            warn!(
                "event=storage_dir_fallback path={} reason=\"{reason}\"",
                self.fallback.display()
            );
        }
        ResolvedDirectory {
            path: self.fallback.clone(),
            origin: DirectoryOrigin::Fallback(reason.map(|err| err.to_string())),
        }
    }
}

/// The documented default storage location, `~/JournalEntries`.
pub fn default_entries_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(FALLBACK_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(FALLBACK_DIR_NAME))
}

// A directory that does not exist yet is fine as long as it could be created:
// the nearest existing ancestor must be a writable directory.
fn check_accessible(path: &Path) -> CoreResult<()> {
    let probe_dir = path
        .ancestors()
        .find(|candidate| !candidate.as_os_str().is_empty() && candidate.exists())
        .unwrap_or_else(|| Path::new("."));
    if !probe_dir.is_dir() {
        return Err(CoreError::PermissionDenied(path.to_path_buf()));
    }
    match tempfile::tempfile_in(probe_dir) {
        Ok(_) => Ok(()),
        Err(err) => {
            debug!(
                "event=storage_dir_not_writable path={} probe={} reason=\"{err}\"",
                path.display(),
                probe_dir.display()
            );
            Err(CoreError::PermissionDenied(path.to_path_buf()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_core::SkipTimeout;
    use tempfile::TempDir;

    fn store_in(temp: &TempDir) -> FsConfigStore {
        FsConfigStore::new(temp.path().join("config").join(CONFIG_FILE_NAME))
    }

    #[test]
    fn missing_config_loads_defaults() {
        let temp = TempDir::new().expect("temp dir");
        let config = store_in(&temp).load().expect("load");
        assert_eq!(config, Configuration::default());
    }

    #[test]
    fn config_round_trips_through_yaml() {
        let temp = TempDir::new().expect("temp dir");
        let store = store_in(&temp);
        let config = Configuration {
            storage_directory: Some(temp.path().join("entries")),
            skip_timeout: SkipTimeout::new(15).unwrap(),
            launch_at_login: false,
            setup_completed: true,
        };
        store.save(&config).expect("save");
        assert_eq!(store.load().expect("load"), config);
    }

    #[test]
    fn corrupt_config_is_unavailable_and_defaults_apply() {
        let temp = TempDir::new().expect("temp dir");
        let store = store_in(&temp);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "setupCompleted: [not, a, bool").unwrap();

        assert!(matches!(store.load(), Err(CoreError::ConfigUnavailable(_))));
        assert_eq!(store.load_or_default(), Configuration::default());
    }

    #[test]
    fn reloader_reports_only_changes() {
        let temp = TempDir::new().expect("temp dir");
        let store = store_in(&temp);
        store.save(&Configuration::default()).unwrap();
        let mut reloader = ConfigReloader::new(store.clone());

        assert!(reloader.reload_if_changed().unwrap().is_none());

        store.update(|config| config.setup_completed = true).unwrap();
        let reloaded = reloader.reload_if_changed().unwrap().expect("change seen");
        assert!(reloaded.setup_completed);
        assert!(reloader.reload_if_changed().unwrap().is_none());
    }

    #[test]
    fn unset_directory_uses_fallback_without_notice() {
        let temp = TempDir::new().expect("temp dir");
        let fallback = temp.path().join("fallback");
        let directory = DirectoryConfig::with_fallback(store_in(&temp), fallback.clone());

        assert_eq!(directory.get(), fallback);
        assert_eq!(directory.resolved().origin, DirectoryOrigin::Fallback(None));
        assert!(directory.notice().is_none());
    }

    #[test]
    fn configured_directory_wins() {
        let temp = TempDir::new().expect("temp dir");
        let store = store_in(&temp);
        let chosen = temp.path().join("chosen");
        store
            .update(|config| config.storage_directory = Some(chosen.clone()))
            .unwrap();
        let directory = DirectoryConfig::with_fallback(store, temp.path().join("fallback"));

        assert_eq!(directory.get(), chosen);
        assert_eq!(directory.resolved().origin, DirectoryOrigin::Configured);
    }

    #[test]
    fn unusable_directory_falls_back_with_notice() {
        let temp = TempDir::new().expect("temp dir");
        let store = store_in(&temp);
        let not_a_dir = temp.path().join("file.txt");
        fs::write(&not_a_dir, "x").unwrap();
        store
            .update(|config| config.storage_directory = Some(not_a_dir.clone()))
            .unwrap();
        let fallback = temp.path().join("fallback");
        let directory = DirectoryConfig::with_fallback(store, fallback.clone());

        assert_eq!(directory.get(), fallback);
        let notice = directory.notice().expect("notice");
        assert!(notice.contains("permission denied"));
        assert!(notice.contains("fallback"));
    }

    #[test]
    fn set_persists_and_supersedes_cache() {
        let temp = TempDir::new().expect("temp dir");
        let store = store_in(&temp);
        let directory = DirectoryConfig::with_fallback(store.clone(), temp.path().join("fallback"));
        let _ = directory.get();

        let chosen = temp.path().join("chosen");
        directory.set(&chosen).expect("set");

        assert_eq!(directory.get(), chosen);
        assert_eq!(store.load().unwrap().storage_directory, Some(chosen.clone()));
        let reopened = DirectoryConfig::with_fallback(store, temp.path().join("fallback"));
        assert_eq!(reopened.get(), chosen);
    }

    #[test]
    fn invalidate_picks_up_changes_from_elsewhere() {
        let temp = TempDir::new().expect("temp dir");
        let store = store_in(&temp);
        let fallback = temp.path().join("fallback");
        let directory = DirectoryConfig::with_fallback(store.clone(), fallback.clone());
        assert_eq!(directory.get(), fallback);

        let chosen = temp.path().join("chosen");
        store
            .update(|config| config.storage_directory = Some(chosen.clone()))
            .unwrap();
        assert_eq!(directory.get(), fallback);

        directory.invalidate();
        assert_eq!(directory.get(), chosen);
    }

    #[cfg(unix)]
    fn read_only_dir(temp: &TempDir) -> Option<PathBuf> {
        use std::os::unix::fs::PermissionsExt;

        let dir = temp.path().join("locked");
        fs::create_dir(&dir).unwrap();
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o555)).unwrap();
        // Root ignores mode bits, so there is nothing to observe.
        if fs::File::create(dir.join("canary")).is_ok() {
            return None;
        }
        Some(dir)
    }

    #[cfg(unix)]
    fn unlock(dir: &Path) {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn unwritable_directory_falls_back_with_notice() {
        let temp = TempDir::new().expect("temp dir");
        let Some(locked) = read_only_dir(&temp) else {
            return;
        };
        let store = store_in(&temp);
        store
            .update(|config| config.storage_directory = Some(locked.clone()))
            .unwrap();
        let fallback = temp.path().join("fallback");
        let directory = DirectoryConfig::with_fallback(store, fallback.clone());

        assert_eq!(directory.get(), fallback);
        assert!(directory.notice().expect("notice").contains("permission denied"));
        unlock(&locked);
    }

    #[cfg(unix)]
    #[test]
    fn missing_directory_under_unwritable_parent_is_rejected() {
        let temp = TempDir::new().expect("temp dir");
        let Some(locked) = read_only_dir(&temp) else {
            return;
        };
        let directory = DirectoryConfig::with_fallback(store_in(&temp), temp.path().join("fallback"));

        let result = directory.set(&locked.join("journal"));

        assert!(matches!(result, Err(CoreError::PermissionDenied(_))));
        unlock(&locked);
    }

    #[test]
    fn missing_directory_under_writable_parent_is_accepted() {
        let temp = TempDir::new().expect("temp dir");
        let directory = DirectoryConfig::with_fallback(store_in(&temp), temp.path().join("fallback"));
        let chosen = temp.path().join("not").join("yet").join("there");

        directory.set(&chosen).expect("set");

        assert_eq!(directory.get(), chosen);
    }

    #[test]
    fn set_rejects_a_file_path() {
        let temp = TempDir::new().expect("temp dir");
        let file = temp.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        let directory = DirectoryConfig::with_fallback(store_in(&temp), temp.path().join("fallback"));

        assert!(matches!(directory.set(&file), Err(CoreError::PermissionDenied(_))));
    }
}
