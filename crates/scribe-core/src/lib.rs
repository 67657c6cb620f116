//! Core domain entities, rules, and traits for Sunrise Scribe.

use std::fmt;
use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors returned by core validation, storage, and gating rules.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Returned when a validation rule is violated.
    #[error("validation error: {0}")]
    Validation(String),
    /// Returned when reading or writing entries or settings fails.
    #[error("io error: {0}")]
    Io(String),
    /// Returned when an entry file does not follow the two-section layout.
    #[error("entry does not match the expected layout: {0}")]
    ParseMismatch(String),
    /// Returned when the storage directory cannot be used.
    #[error("permission denied for {}", .0.display())]
    PermissionDenied(PathBuf),
    /// Returned when no stored configuration can be located or read.
    #[error("configuration unavailable: {0}")]
    ConfigUnavailable(String),
    /// Returned when skipping is attempted before the countdown elapsed.
    #[error("skip is locked for another {remaining}s")]
    SkipLocked {
        /// Seconds left on the countdown.
        remaining: u32,
    },
    /// Returned when a form action arrives while nothing is presented.
    #[error("the entry form is not being presented")]
    NotPresenting,
    /// Returned when the blocking host rejects a directive.
    #[error("host error: {0}")]
    Host(String),
}

/// A single day's journal entry, keyed by its calendar date.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JournalEntry {
    date: NaiveDate,
    yesterday_text: String,
    today_text: String,
}

impl JournalEntry {
    /// Create an entry for saving, rejecting empty or whitespace-only answers.
    pub fn new(
        date: NaiveDate,
        yesterday_text: impl Into<String>,
        today_text: impl Into<String>,
    ) -> CoreResult<Self> {
        let entry = Self::recovered(date, yesterday_text, today_text);
        if entry.yesterday_text.is_empty() {
            return Err(CoreError::Validation("yesterday's reflection cannot be empty".into()));
        }
        if entry.today_text.is_empty() {
            return Err(CoreError::Validation("today's intentions cannot be empty".into()));
        }
        Ok(entry)
    }

    /// Build an entry from text found on disk. Either section may be empty.
    pub fn recovered(
        date: NaiveDate,
        yesterday_text: impl Into<String>,
        today_text: impl Into<String>,
    ) -> Self {
        Self {
            date,
            yesterday_text: yesterday_text.into().trim().to_string(),
            today_text: today_text.into().trim().to_string(),
        }
    }

    /// The date this entry belongs to.
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Reflection on the previous day.
    pub fn yesterday_text(&self) -> &str {
        &self.yesterday_text
    }

    /// Intentions for the entry's day.
    pub fn today_text(&self) -> &str {
        &self.today_text
    }

    /// Whether both sections carry text.
    pub fn is_complete(&self) -> bool {
        !self.yesterday_text.is_empty() && !self.today_text.is_empty()
    }
}

/// Unsaved text deferred by the user for a single date.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Draft {
    /// The date the text was captured for.
    pub date: NaiveDate,
    /// Reflection on the previous day, possibly empty.
    pub yesterday_text: String,
    /// Intentions for the day, possibly empty.
    pub today_text: String,
}

impl Draft {
    pub fn new(date: NaiveDate, yesterday_text: impl Into<String>, today_text: impl Into<String>) -> Self {
        Self {
            date,
            yesterday_text: yesterday_text.into(),
            today_text: today_text.into(),
        }
    }

    /// Whether the draft carries no text at all.
    pub fn is_empty(&self) -> bool {
        self.yesterday_text.trim().is_empty() && self.today_text.trim().is_empty()
    }
}

/// Seconds the user must wait before the form can be skipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct SkipTimeout(u32);

impl SkipTimeout {
    /// Values offered by settings and setup.
    pub const OPTIONS: [u32; 6] = [10, 15, 30, 45, 60, 120];

    /// Timeout used when nothing has been chosen.
    pub const DEFAULT: Self = Self(30);

    /// Create a timeout from one of the allowed values.
    pub fn new(seconds: u32) -> CoreResult<Self> {
        if Self::OPTIONS.contains(&seconds) {
            Ok(Self(seconds))
        } else {
            Err(CoreError::Validation(format!(
                "skip timeout must be one of {:?} seconds, got {seconds}",
                Self::OPTIONS
            )))
        }
    }

    /// The timeout in seconds.
    pub fn seconds(self) -> u32 {
        self.0
    }
}

impl Default for SkipTimeout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u32> for SkipTimeout {
    fn from(value: u32) -> Self {
        Self::new(value).unwrap_or_else(|_| {
            warn!("event=config_value_rejected key=skipTimeoutSeconds value={value} fallback=30");
            Self::DEFAULT
        })
    }
}

impl From<SkipTimeout> for u32 {
    fn from(value: SkipTimeout) -> Self {
        value.0
    }
}

impl fmt::Display for SkipTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// User preferences persisted across restarts.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
    /// Chosen storage directory; `None` means the fallback location.
    #[serde(
        rename = "storageDirectoryBookmark",
        skip_serializing_if = "Option::is_none"
    )]
    pub storage_directory: Option<PathBuf>,
    /// Countdown before the form may be skipped.
    #[serde(rename = "skipTimeoutSeconds")]
    pub skip_timeout: SkipTimeout,
    /// Whether the app registers itself to start at login.
    pub launch_at_login: bool,
    /// Whether first-run setup has finished. No gating happens before it.
    pub setup_completed: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            storage_directory: None,
            skip_timeout: SkipTimeout::DEFAULT,
            launch_at_login: true,
            setup_completed: false,
        }
    }
}

/// Which presentation path a show request takes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShowKind {
    /// Respects the "today's entry already exists" suppression rule.
    Gate,
    /// Always shows today's content for editing.
    Review,
}

/// External signals asking whether the entry form should be shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// The login session became active again.
    SessionUnlocked,
    /// The screen lock was released.
    ScreenUnlocked,
    /// The app was launched or re-opened while running.
    AppReactivated,
    /// Something asked explicitly for the form.
    ExplicitShowRequest(ShowKind),
}

impl Trigger {
    /// The presentation path this trigger takes.
    pub fn show_kind(self) -> ShowKind {
        match self {
            Trigger::ExplicitShowRequest(kind) => kind,
            Trigger::SessionUnlocked | Trigger::ScreenUnlocked | Trigger::AppReactivated => {
                ShowKind::Gate
            }
        }
    }

    /// Stable name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            Trigger::SessionUnlocked => "session_unlocked",
            Trigger::ScreenUnlocked => "screen_unlocked",
            Trigger::AppReactivated => "app_reactivated",
            Trigger::ExplicitShowRequest(ShowKind::Gate) => "explicit_show_gate",
            Trigger::ExplicitShowRequest(ShowKind::Review) => "explicit_show_review",
        }
    }
}

/// Storage abstraction for dated journal entries.
pub trait EntryStore {
    /// Whether an entry file exists for the date.
    fn exists(&self, date: NaiveDate) -> bool;
    /// Read the entry for a date, `None` when there is none.
    fn read(&self, date: NaiveDate) -> CoreResult<Option<JournalEntry>>;
    /// Write an entry, replacing any existing one for the same date.
    fn write(&self, entry: &JournalEntry) -> CoreResult<PathBuf>;
}

/// Host that can lock the desktop around the entry form.
pub trait BlockingHost {
    /// Restrict switching away and present the form full-screen.
    fn enter_blocking_mode(&mut self) -> CoreResult<()>;
    /// Lift every restriction applied by `enter_blocking_mode`.
    fn exit_blocking_mode(&mut self) -> CoreResult<()>;
}

/// Registration with the platform's "start at login" mechanism.
pub trait LoginItems {
    /// Make the app start at login.
    fn register(&self) -> CoreResult<()>;
    /// Stop the app from starting at login.
    fn unregister(&self) -> CoreResult<()>;
}

/// Source of trigger events, polled by the event router.
pub trait TriggerSource {
    /// Return the source name.
    fn name(&self) -> &'static str;
    /// Return the triggers observed since the previous poll.
    fn poll(&mut self) -> CoreResult<Vec<Trigger>>;
}

/// Provides the current calendar date.
pub trait Clock {
    /// Today's date in the user's local time zone.
    fn today(&self) -> NaiveDate;
}

/// Clock backed by the system's local time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn entry_rejects_empty_sections() {
        let result = JournalEntry::new(date(), "   ", "ship it");
        assert!(matches!(result, Err(CoreError::Validation(_))));
        let result = JournalEntry::new(date(), "slept well", "\n\t");
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn entry_trims_sections() {
        let entry = JournalEntry::new(date(), "  walked  \n", "\twrite\n").unwrap();
        assert_eq!(entry.yesterday_text(), "walked");
        assert_eq!(entry.today_text(), "write");
        assert!(entry.is_complete());
    }

    #[test]
    fn recovered_entry_allows_empty_section() {
        let entry = JournalEntry::recovered(date(), "", "only today");
        assert!(!entry.is_complete());
        assert_eq!(entry.today_text(), "only today");
    }

    #[test]
    fn skip_timeout_accepts_only_offered_values() {
        assert_eq!(SkipTimeout::new(45).unwrap().seconds(), 45);
        assert!(matches!(SkipTimeout::new(20), Err(CoreError::Validation(_))));
        assert_eq!(SkipTimeout::from(7), SkipTimeout::DEFAULT);
    }

    #[test]
    fn configuration_defaults_fill_missing_keys() {
        let config: Configuration = serde_yaml::from_str("setupCompleted: true\n").unwrap();
        assert!(config.setup_completed);
        assert!(config.launch_at_login);
        assert_eq!(config.skip_timeout.seconds(), 30);
        assert!(config.storage_directory.is_none());
    }

    #[test]
    fn configuration_uses_stored_key_names() {
        let config = Configuration {
            storage_directory: Some(PathBuf::from("/tmp/journal")),
            skip_timeout: SkipTimeout::new(60).unwrap(),
            launch_at_login: false,
            setup_completed: true,
        };
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("storageDirectoryBookmark: /tmp/journal"));
        assert!(yaml.contains("skipTimeoutSeconds: 60"));
        assert!(yaml.contains("launchAtLogin: false"));
        assert!(yaml.contains("setupCompleted: true"));
    }

    #[test]
    fn unknown_timeout_in_config_falls_back() {
        let config: Configuration = serde_yaml::from_str("skipTimeoutSeconds: 999\n").unwrap();
        assert_eq!(config.skip_timeout, SkipTimeout::DEFAULT);
    }

    #[test]
    fn triggers_map_to_show_kinds() {
        assert_eq!(Trigger::ScreenUnlocked.show_kind(), ShowKind::Gate);
        assert_eq!(Trigger::AppReactivated.show_kind(), ShowKind::Gate);
        assert_eq!(
            Trigger::ExplicitShowRequest(ShowKind::Review).show_kind(),
            ShowKind::Review
        );
    }
}
