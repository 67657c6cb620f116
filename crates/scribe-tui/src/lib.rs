//! Terminal front end: the blocking entry form and the long-running daemon.

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use crossterm::event::{self, Event, KeyEventKind};
use log::{info, warn};

use scribe_core::{Configuration, CoreError, LoginItems, ShowKind, SystemClock, Trigger};
use scribe_fs::{state_dir, ConfigReloader, DirectoryConfig, FsConfigStore, FsEntryStore, XdgAutostart};
use scribe_gate::{EventRouter, GateController, GateOutcome, SuppressReason};
use scribe_utils::logging::{init_logging, level_from_env};
use scribe_watch::default_sources;

mod form;
mod host;

pub use form::{handle_key, render_form, Field, FormAction, FormState, FormView, TextInput};
pub use host::TerminalHost;

const TICK_RATE: Duration = Duration::from_secs(1);
const SOURCE_POLL_INTERVAL: Duration = Duration::from_secs(1);

type Controller = GateController<FsEntryStore, TerminalHost, SystemClock>;

/// Start file logging in the state directory.
///
/// Returns false, after a warning on stderr, when logs cannot be written. The
/// caller carries on without them.
pub fn start_logging() -> bool {
    match state_dir() {
        Ok(state) => start_logging_in(&state),
        Err(err) => {
            eprintln!("warning: logging disabled: {err}");
            false
        }
    }
}

/// Start file logging in `state/logs`. See [`start_logging`].
pub fn start_logging_in(state: &Path) -> bool {
    match init_logging(&level_from_env(), &state.join("logs")) {
        Ok(()) => true,
        Err(err) => {
            eprintln!("warning: logging disabled: {err}");
            false
        }
    }
}

/// Register or remove the autostart entry to match `enabled`.
pub fn sync_login_item(enabled: bool) -> Result<()> {
    let autostart = XdgAutostart::for_current_user()?;
    if enabled {
        autostart.register()?;
    } else {
        autostart.unregister()?;
    }
    Ok(())
}

/// Run until killed, showing the form whenever a trigger calls for it.
pub fn run_daemon() -> Result<()> {
    let config_store = FsConfigStore::open_default()?;
    let config = config_store.load_or_default();
    if let Err(err) = sync_login_item(config.launch_at_login) {
        warn!("event=login_item_sync_failed reason=\"{err}\"");
    }

    let state = state_dir()?;
    let mut controller = build_controller(&config_store, config);
    let mut reloader = ConfigReloader::new(config_store);
    let mut router = EventRouter::new();
    for source in default_sources(&state) {
        router.subscribe(source);
    }
    info!("event=daemon_started sources={:?}", router.source_names());
    if !controller.config().setup_completed {
        println!("Sunrise Scribe is waiting for setup. Run `scribe setup` to finish.");
    }

    router.emit(Trigger::AppReactivated, Instant::now());
    let mut form: Option<FormState> = None;
    let mut last_poll: Option<Instant> = None;

    loop {
        let now = Instant::now();
        if last_poll.map_or(true, |last| now.duration_since(last) >= SOURCE_POLL_INTERVAL) {
            last_poll = Some(now);
            router.poll_sources(now);
            reload_config(&mut controller, &mut reloader, &mut router, now);
        }

        for outcome in router.dispatch(&mut controller) {
            on_outcome(&controller, &mut form, outcome);
        }

        if controller.is_presenting() {
            let form = form.get_or_insert_with(|| form_for(&controller));
            step_form(&mut controller, form)?;
        } else {
            form = None;
            thread::sleep(SOURCE_POLL_INTERVAL);
        }
    }
}

/// Show today's entry for editing once, returning when the form closes.
pub fn run_review() -> Result<()> {
    let config_store = FsConfigStore::open_default()?;
    let config = config_store.load_or_default();
    let mut controller = build_controller(&config_store, config);

    match controller.review_show()? {
        GateOutcome::Suppressed(SuppressReason::SetupPending) => {
            bail!("setup has not been completed; run `scribe setup` first")
        }
        GateOutcome::Suppressed(reason) => bail!("review unavailable: {reason:?}"),
        _ => {}
    }

    let mut form = form_for(&controller);
    while controller.is_presenting() {
        step_form(&mut controller, &mut form)?;
    }
    Ok(())
}

fn build_controller(config_store: &FsConfigStore, config: Configuration) -> Controller {
    let store = FsEntryStore::new(DirectoryConfig::new(config_store.clone()));
    GateController::new(store, TerminalHost::new(), SystemClock, config)
}

fn reload_config(
    controller: &mut Controller,
    reloader: &mut ConfigReloader,
    router: &mut EventRouter,
    now: Instant,
) {
    let config = match reloader.reload_if_changed() {
        Ok(Some(config)) => config,
        Ok(None) => return,
        Err(err) => {
            warn!("event=config_reload_failed reason=\"{err}\"");
            return;
        }
    };
    if config.storage_directory != controller.config().storage_directory {
        controller.store().directory().invalidate();
    }
    if config.launch_at_login != controller.config().launch_at_login {
        if let Err(err) = sync_login_item(config.launch_at_login) {
            warn!("event=login_item_sync_failed reason=\"{err}\"");
        }
    }
    if controller.apply_config(config) {
        info!("event=setup_completed");
        router.emit(Trigger::ExplicitShowRequest(ShowKind::Gate), now);
    }
}

fn on_outcome(controller: &Controller, form: &mut Option<FormState>, outcome: GateOutcome) {
    match outcome {
        GateOutcome::Presented { .. } => *form = Some(form_for(controller)),
        GateOutcome::Refreshed => {
            if let (Some(form), Some(presentation)) = (form.as_mut(), controller.presentation()) {
                form.sync(&presentation.yesterday_text, &presentation.today_text);
            }
        }
        GateOutcome::AlreadyPresenting | GateOutcome::Suppressed(_) => {}
    }
}

fn form_for(controller: &Controller) -> FormState {
    let mut form = controller
        .presentation()
        .map(|presentation| FormState::new(&presentation.yesterday_text, &presentation.today_text))
        .unwrap_or_default();
    form.status = controller.store().directory().notice();
    form
}

// One draw and at most one key press; returns after the tick rate at the latest.
fn step_form(controller: &mut Controller, form: &mut FormState) -> Result<()> {
    controller.poll_countdown(Instant::now());
    let Some(presentation) = controller.presentation() else {
        return Ok(());
    };
    let view = FormView {
        date: presentation.date,
        kind: presentation.kind,
        remaining: controller.countdown().remaining(),
        can_save: controller.can_save(),
    };

    controller
        .host_mut()
        .draw(|frame| render_form(frame, form, &view))
        .context("failed to draw the entry form")?;

    if event::poll(TICK_RATE)? {
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                let action = handle_key(form, key);
                apply_action(controller, form, action)?;
            }
        }
    }
    Ok(())
}

fn apply_action(controller: &mut Controller, form: &mut FormState, action: FormAction) -> Result<()> {
    match action {
        FormAction::None => {}
        FormAction::Edited => {
            controller.update_text(form.yesterday.text(), form.today.text())?;
            form.status = None;
        }
        FormAction::Save => {
            if !controller.can_save() {
                form.status = Some("Answer both questions to save.".into());
                return Ok(());
            }
            match controller.save() {
                Ok(path) => println!("Saved {}", path.display()),
                Err(err) => form.status = Some(format!("Could not save: {err}")),
            }
        }
        FormAction::Skip => match controller.defer() {
            Ok(()) => {}
            Err(CoreError::SkipLocked { remaining }) => {
                form.status = Some(format!("You can skip in {remaining}s."));
            }
            Err(err) => form.status = Some(err.to_string()),
        },
    }
    Ok(())
}
