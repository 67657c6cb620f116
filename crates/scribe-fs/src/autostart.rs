//! Launch-at-login registration through an XDG autostart entry.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::info;

use scribe_core::{CoreError, CoreResult, LoginItems};
use scribe_utils::write_atomically;

use crate::APP_DIR_NAME;

/// Writes and removes `~/.config/autostart/sunrise-scribe.desktop`.
#[derive(Debug, Clone)]
pub struct XdgAutostart {
    entry_path: PathBuf,
    exec: PathBuf,
}

impl XdgAutostart {
    /// Create an autostart entry in `autostart_dir` that runs `exec`.
    pub fn new(autostart_dir: &Path, exec: PathBuf) -> Self {
        Self {
            entry_path: autostart_dir.join(format!("{APP_DIR_NAME}.desktop")),
            exec,
        }
    }

    /// Autostart entry for the running executable in the user's config directory.
    pub fn for_current_user() -> CoreResult<Self> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            CoreError::ConfigUnavailable("unable to determine config directory".into())
        })?;
        let exec = std::env::current_exe().map_err(|err| CoreError::Io(err.to_string()))?;
        Ok(Self::new(&config_dir.join("autostart"), exec))
    }

    /// Location of the `.desktop` file.
    pub fn entry_path(&self) -> &Path {
        &self.entry_path
    }

    /// Whether the autostart entry is present.
    pub fn is_registered(&self) -> bool {
        self.entry_path.exists()
    }

    fn desktop_entry(&self) -> String {
        format!(
            "[Desktop Entry]\n\
             Type=Application\n\
             Name=Sunrise Scribe\n\
             Comment=Daily journaling prompt\n\
             Exec=\"{}\" run\n\
             Terminal=true\n\
             X-GNOME-Autostart-enabled=true\n",
            self.exec.display()
        )
    }
}

impl LoginItems for XdgAutostart {
    fn register(&self) -> CoreResult<()> {
        write_atomically(&self.entry_path, self.desktop_entry().as_bytes())?;
        info!("event=login_item_registered path={}", self.entry_path.display());
        Ok(())
    }

    fn unregister(&self) -> CoreResult<()> {
        match fs::remove_file(&self.entry_path) {
            Ok(()) => {
                info!("event=login_item_unregistered path={}", self.entry_path.display());
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(CoreError::Io(err.to_string())),
        }
    }
}
