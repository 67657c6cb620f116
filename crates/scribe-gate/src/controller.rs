//! The daily-entry gating state machine.
//!
//! ```text
//! Idle --gate_show (setup done, no file today)--> Presenting
//! Idle --review_show (setup done)--------------> Presenting
//! Presenting --save (write ok)-----------------> Idle
//! Presenting --defer (countdown at zero)-------> Idle   (text kept as draft)
//! Presenting --dismiss (host closed the form)--> Idle   (text kept as draft)
//! ```
//!
//! The countdown is armed on every entry into `Presenting` and released on
//! every exit from it.

use std::path::PathBuf;
use std::time::Instant;

use chrono::NaiveDate;
use log::{debug, error, info, warn};

use scribe_core::{
    BlockingHost, Clock, Configuration, CoreError, CoreResult, EntryStore, JournalEntry, ShowKind,
    Trigger,
};

use crate::countdown::CountdownGate;
use crate::draft::DraftCache;

/// Where a presentation's initial text came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentSource {
    /// A same-day deferred draft.
    Draft,
    /// The day's entry file.
    File,
    /// Nothing to preload.
    Empty,
}

/// The form as currently shown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Presentation {
    /// The date the entry will be saved under.
    pub date: NaiveDate,
    /// Which path opened the form.
    pub kind: ShowKind,
    /// Where the initial text came from.
    pub source: ContentSource,
    /// Current reflection text.
    pub yesterday_text: String,
    /// Current intentions text.
    pub today_text: String,
}

impl Presentation {
    fn has_text(&self) -> bool {
        !self.yesterday_text.trim().is_empty() || !self.today_text.trim().is_empty()
    }
}

/// Whether the form is up.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum GateState {
    #[default]
    Idle,
    Presenting(Presentation),
}

/// Why a show request did not open the form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuppressReason {
    /// First-run setup has not finished.
    SetupPending,
    /// Today's entry is already written.
    EntryExists,
}

/// Result of handling a show request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateOutcome {
    /// The form was opened.
    Presented {
        kind: ShowKind,
        source: ContentSource,
    },
    /// The form was already open; nothing restarted.
    AlreadyPresenting,
    /// The form was already open and moved on to a new date.
    Refreshed,
    /// The form stays closed.
    Suppressed(SuppressReason),
}

/// Decides when to block the user with the entry form and what to preload into it.
///
/// Services are injected so tests can swap in fakes; the controller owns none of
/// the persisted state it reads.
#[derive(Debug)]
pub struct GateController<S, H, C> {
    store: S,
    host: H,
    clock: C,
    config: Configuration,
    drafts: DraftCache,
    countdown: CountdownGate,
    state: GateState,
}

impl<S, H, C> GateController<S, H, C>
where
    S: EntryStore,
    H: BlockingHost,
    C: Clock,
{
    /// Create an idle controller.
    pub fn new(store: S, host: H, clock: C, config: Configuration) -> Self {
        Self {
            store,
            host,
            clock,
            config,
            drafts: DraftCache::new(),
            countdown: CountdownGate::new(),
            state: GateState::Idle,
        }
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    /// The open presentation, if any.
    pub fn presentation(&self) -> Option<&Presentation> {
        match &self.state {
            GateState::Presenting(presentation) => Some(presentation),
            GateState::Idle => None,
        }
    }

    pub fn is_presenting(&self) -> bool {
        matches!(self.state, GateState::Presenting(_))
    }

    pub fn countdown(&self) -> &CountdownGate {
        &self.countdown
    }

    pub fn drafts(&self) -> &DraftCache {
        &self.drafts
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Swap in a re-read configuration. Returns true when setup has just been completed.
    ///
    /// A running countdown keeps its current length; the new timeout applies to
    /// the next presentation.
    pub fn apply_config(&mut self, config: Configuration) -> bool {
        let setup_finished = !self.config.setup_completed && config.setup_completed;
        self.config = config;
        setup_finished
    }

    /// Route a trigger to the matching show path.
    pub fn handle(&mut self, trigger: Trigger) -> CoreResult<GateOutcome> {
        debug!("event=trigger_received trigger={}", trigger.name());
        match trigger.show_kind() {
            ShowKind::Gate => self.gate_show(),
            ShowKind::Review => self.review_show(),
        }
    }

    /// Present the form unless today's entry already exists.
    pub fn gate_show(&mut self) -> CoreResult<GateOutcome> {
        if !self.config.setup_completed {
            debug!("event=gate_suppressed reason=setup_pending");
            return Ok(GateOutcome::Suppressed(SuppressReason::SetupPending));
        }
        if self.is_presenting() {
            return self.refresh();
        }
        let today = self.clock.today();
        if self.store.exists(today) {
            debug!("event=gate_suppressed reason=entry_exists date={today}");
            return Ok(GateOutcome::Suppressed(SuppressReason::EntryExists));
        }
        self.present(today, ShowKind::Gate)
    }

    /// Present today's content for editing, whether or not it was already saved.
    pub fn review_show(&mut self) -> CoreResult<GateOutcome> {
        if !self.config.setup_completed {
            debug!("event=review_suppressed reason=setup_pending");
            return Ok(GateOutcome::Suppressed(SuppressReason::SetupPending));
        }
        if let GateState::Presenting(presentation) = &mut self.state {
            presentation.kind = ShowKind::Review;
            return self.refresh();
        }
        let today = self.clock.today();
        self.present(today, ShowKind::Review)
    }

    /// Replace the text of the open form.
    pub fn update_text(
        &mut self,
        yesterday_text: impl Into<String>,
        today_text: impl Into<String>,
    ) -> CoreResult<()> {
        let GateState::Presenting(presentation) = &mut self.state else {
            return Err(CoreError::NotPresenting);
        };
        presentation.yesterday_text = yesterday_text.into();
        presentation.today_text = today_text.into();
        Ok(())
    }

    /// Whether both answers carry text.
    pub fn can_save(&self) -> bool {
        self.presentation().is_some_and(|presentation| {
            !presentation.yesterday_text.trim().is_empty()
                && !presentation.today_text.trim().is_empty()
        })
    }

    /// Whether the form is open and its countdown has elapsed.
    pub fn can_skip(&self) -> bool {
        self.is_presenting() && self.countdown.can_skip()
    }

    /// Advance the countdown by one second.
    pub fn tick(&mut self) -> bool {
        self.is_presenting() && self.countdown.tick()
    }

    /// Advance the countdown by the whole seconds elapsed up to `now`.
    pub fn poll_countdown(&mut self, now: Instant) -> u32 {
        if !self.is_presenting() {
            return 0;
        }
        self.countdown.poll(now)
    }

    /// Write the entry and close the form.
    ///
    /// On failure the form stays open with its text untouched so the user can retry.
    pub fn save(&mut self) -> CoreResult<PathBuf> {
        let GateState::Presenting(presentation) = &self.state else {
            return Err(CoreError::NotPresenting);
        };
        let entry = JournalEntry::new(
            presentation.date,
            presentation.yesterday_text.as_str(),
            presentation.today_text.as_str(),
        )?;
        let path = self.store.write(&entry).map_err(|err| {
            warn!("event=entry_save_failed date={} reason=\"{err}\"", entry.date());
            err
        })?;
        self.drafts.clear();
        self.close("saved");
        Ok(path)
    }

    /// Close the form without writing, keeping the text as today's draft.
    pub fn defer(&mut self) -> CoreResult<()> {
        if !self.is_presenting() {
            return Err(CoreError::NotPresenting);
        }
        if !self.countdown.can_skip() {
            return Err(CoreError::SkipLocked {
                remaining: self.countdown.remaining(),
            });
        }
        self.keep_as_draft();
        self.close("deferred");
        Ok(())
    }

    /// Close the form because the host tore it down, keeping any text as a draft.
    pub fn dismiss(&mut self) -> CoreResult<()> {
        if !self.is_presenting() {
            return Err(CoreError::NotPresenting);
        }
        self.keep_as_draft();
        self.close("dismissed");
        Ok(())
    }

    fn present(&mut self, date: NaiveDate, kind: ShowKind) -> CoreResult<GateOutcome> {
        let (source, yesterday_text, today_text) = self.initial_content(date)?;

        self.countdown
            .start(self.config.skip_timeout.seconds(), Instant::now());
        if let Err(err) = self.host.enter_blocking_mode() {
            self.countdown.stop();
            error!("event=blocking_mode_failed reason=\"{err}\"");
            return Err(err);
        }

        self.state = GateState::Presenting(Presentation {
            date,
            kind,
            source,
            yesterday_text,
            today_text,
        });
        info!(
            "event=form_presented date={date} kind={kind:?} source={source:?} timeout={}",
            self.config.skip_timeout
        );
        Ok(GateOutcome::Presented { kind, source })
    }

    // Draft first, then whatever is on disk, then nothing.
    fn initial_content(&mut self, date: NaiveDate) -> CoreResult<(ContentSource, String, String)> {
        if let Some(draft) = self.drafts.load(date) {
            return Ok((ContentSource::Draft, draft.yesterday_text, draft.today_text));
        }
        if let Some(entry) = self.store.read(date)? {
            return Ok((
                ContentSource::File,
                entry.yesterday_text().to_string(),
                entry.today_text().to_string(),
            ));
        }
        Ok((ContentSource::Empty, String::new(), String::new()))
    }

    // Re-trigger while open: never restarts the countdown or re-enters blocking
    // mode. Only a date rollover changes what is shown.
    fn refresh(&mut self) -> CoreResult<GateOutcome> {
        let today = self.clock.today();
        let (date, has_text) = match &self.state {
            GateState::Presenting(presentation) => (presentation.date, presentation.has_text()),
            GateState::Idle => return Err(CoreError::NotPresenting),
        };
        if date == today {
            return Ok(GateOutcome::AlreadyPresenting);
        }

        let fresh = if has_text {
            None
        } else {
            Some(self.initial_content(today)?)
        };
        if let GateState::Presenting(presentation) = &mut self.state {
            presentation.date = today;
            if let Some((source, yesterday_text, today_text)) = fresh {
                presentation.source = source;
                presentation.yesterday_text = yesterday_text;
                presentation.today_text = today_text;
            }
        }
        info!("event=form_rolled_over from={date} to={today} kept_text={has_text}");
        Ok(GateOutcome::Refreshed)
    }

    fn keep_as_draft(&mut self) {
        if let GateState::Presenting(presentation) = &self.state {
            self.drafts.store(
                presentation.date,
                presentation.yesterday_text.clone(),
                presentation.today_text.clone(),
            );
        }
    }

    fn close(&mut self, reason: &str) {
        self.countdown.stop();
        self.state = GateState::Idle;
        if let Err(err) = self.host.exit_blocking_mode() {
            error!("event=blocking_mode_exit_failed reason=\"{err}\"");
        }
        info!("event=form_closed reason={reason}");
    }
}
