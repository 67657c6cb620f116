//! Trigger sources: unlock, resume, and activation detection.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant, SystemTime};

use log::{debug, info};

use scribe_core::{CoreError, CoreResult, ShowKind, Trigger, TriggerSource};
use scribe_utils::write_atomically;

/// File dropped into the state directory to ask a running instance for the form.
pub const REQUEST_FILE_NAME: &str = "activate.request";

/// Wall-clock gap between polls that counts as a resume from sleep.
pub const DEFAULT_RESUME_THRESHOLD: Duration = Duration::from_secs(60);

/// Watch the logind `LockedHint` of a session.
#[derive(Debug)]
pub struct LockHintWatcher {
    session: String,
    locked: Option<bool>,
}

impl LockHintWatcher {
    /// Create a watcher for a logind session id.
    pub fn new(session: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            locked: None,
        }
    }

    /// Watch the session named by `XDG_SESSION_ID`, if any.
    pub fn from_env() -> Option<Self> {
        std::env::var("XDG_SESSION_ID")
            .ok()
            .filter(|id| !id.trim().is_empty())
            .map(Self::new)
    }

    /// Record the latest lock state; a locked → unlocked edge yields `ScreenUnlocked`.
    pub fn observe(&mut self, locked: bool) -> Vec<Trigger> {
        let was_locked = self.locked.replace(locked);
        if was_locked == Some(true) && !locked {
            info!("event=screen_unlocked session={}", self.session);
            return vec![Trigger::ScreenUnlocked];
        }
        Vec::new()
    }
}

impl TriggerSource for LockHintWatcher {
    fn name(&self) -> &'static str {
        "logind-lock"
    }

    fn poll(&mut self) -> CoreResult<Vec<Trigger>> {
        let output = match run_command(
            "loginctl",
            &["show-session", &self.session, "-p", "LockedHint", "--value"],
        ) {
            Ok(output) => output,
            Err(err) => {
                debug!("event=lock_hint_unavailable reason=\"{err}\"");
                return Ok(Vec::new());
            }
        };
        match parse_lock_hint(&output) {
            Some(locked) => Ok(self.observe(locked)),
            None => Ok(Vec::new()),
        }
    }
}

fn parse_lock_hint(output: &str) -> Option<bool> {
    match output.trim() {
        "yes" => Some(true),
        "no" => Some(false),
        _ => None,
    }
}

/// Detect resume from suspend by comparing wall-clock and monotonic time.
///
/// The monotonic clock stops while the machine sleeps; the wall clock does not.
#[derive(Debug)]
pub struct ResumeWatcher {
    threshold: Duration,
    last: Option<(SystemTime, Instant)>,
}

impl Default for ResumeWatcher {
    fn default() -> Self {
        Self::new(DEFAULT_RESUME_THRESHOLD)
    }
}

impl ResumeWatcher {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            last: None,
        }
    }

    /// Record a pair of clock readings; a large enough gap yields `SessionUnlocked`.
    pub fn observe(&mut self, wall: SystemTime, mono: Instant) -> Vec<Trigger> {
        let previous = self.last.replace((wall, mono));
        let Some((last_wall, last_mono)) = previous else {
            return Vec::new();
        };
        let wall_delta = wall.duration_since(last_wall).unwrap_or_default();
        let mono_delta = mono.saturating_duration_since(last_mono);
        let slept = wall_delta.saturating_sub(mono_delta);
        if slept >= self.threshold {
            info!("event=resume_detected slept_secs={}", slept.as_secs());
            return vec![Trigger::SessionUnlocked];
        }
        Vec::new()
    }
}

impl TriggerSource for ResumeWatcher {
    fn name(&self) -> &'static str {
        "resume"
    }

    fn poll(&mut self) -> CoreResult<Vec<Trigger>> {
        Ok(self.observe(SystemTime::now(), Instant::now()))
    }
}

/// Pick up activation requests left by another invocation of the CLI.
#[derive(Debug)]
pub struct ActivationWatcher {
    path: PathBuf,
}

impl ActivationWatcher {
    /// Watch for a request file inside `state_dir`.
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(REQUEST_FILE_NAME),
        }
    }
}

impl TriggerSource for ActivationWatcher {
    fn name(&self) -> &'static str {
        "activation"
    }

    fn poll(&mut self) -> CoreResult<Vec<Trigger>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(CoreError::Io(err.to_string())),
        };
        fs::remove_file(&self.path).map_err(|err| CoreError::Io(err.to_string()))?;
        let trigger = match contents.trim() {
            "review" => Trigger::ExplicitShowRequest(ShowKind::Review),
            "gate" => Trigger::ExplicitShowRequest(ShowKind::Gate),
            _ => Trigger::AppReactivated,
        };
        info!("event=activation_request trigger={}", trigger.name());
        Ok(vec![trigger])
    }
}

/// Ask a running instance to show the form. `None` behaves like re-opening the app.
pub fn request_activation(state_dir: &Path, kind: Option<ShowKind>) -> CoreResult<PathBuf> {
    let path = state_dir.join(REQUEST_FILE_NAME);
    let body = match kind {
        Some(ShowKind::Review) => "review",
        Some(ShowKind::Gate) => "gate",
        None => "reactivate",
    };
    write_atomically(&path, body.as_bytes())?;
    Ok(path)
}

/// Sources available on this platform.
pub fn default_sources(state_dir: &Path) -> Vec<Box<dyn TriggerSource>> {
    let mut sources: Vec<Box<dyn TriggerSource>> = vec![
        Box::new(ResumeWatcher::default()),
        Box::new(ActivationWatcher::new(state_dir)),
    ];
    if cfg!(target_os = "linux") {
        if let Some(watcher) = LockHintWatcher::from_env() {
            sources.push(Box::new(watcher));
        }
    }
    sources
}

fn run_command(command: &str, args: &[&str]) -> CoreResult<String> {
    let output = Command::new(command)
        .args(args)
        .output()
        .map_err(|err| CoreError::Io(format!("{command}: {err}")))?;

    if !output.status.success() {
        return Err(CoreError::Io(format!(
            "{command} exited with status {}",
            output.status
        )));
    }

    String::from_utf8(output.stdout).map_err(|err| CoreError::Io(err.to_string()))
}
