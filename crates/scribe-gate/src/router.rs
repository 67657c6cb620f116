//! Single-threaded trigger queue in front of the gate controller.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use log::{debug, warn};

use scribe_core::{BlockingHost, Clock, EntryStore, Trigger, TriggerSource};

use crate::controller::{GateController, GateOutcome};

/// Identical triggers closer together than this are treated as one.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);

/// Collects triggers from subscribed sources and feeds them to the controller in order.
pub struct EventRouter {
    sources: Vec<Box<dyn TriggerSource>>,
    queue: VecDeque<Trigger>,
    last_accepted: HashMap<Trigger, Instant>,
    debounce: Duration,
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRouter {
    pub fn new() -> Self {
        Self::with_debounce(DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(debounce: Duration) -> Self {
        Self {
            sources: Vec::new(),
            queue: VecDeque::new(),
            last_accepted: HashMap::new(),
            debounce,
        }
    }

    /// Register a source to be polled by [`EventRouter::poll_sources`].
    pub fn subscribe(&mut self, source: Box<dyn TriggerSource>) {
        debug!("event=source_subscribed source={}", source.name());
        self.sources.push(source);
    }

    /// Names of the subscribed sources.
    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|source| source.name()).collect()
    }

    /// Queue a trigger. Returns false when it repeats one accepted within the debounce window.
    pub fn emit(&mut self, trigger: Trigger, now: Instant) -> bool {
        if let Some(last) = self.last_accepted.get(&trigger) {
            if now.saturating_duration_since(*last) < self.debounce {
                debug!("event=trigger_debounced trigger={}", trigger.name());
                return false;
            }
        }
        self.last_accepted.insert(trigger, now);
        self.queue.push_back(trigger);
        true
    }

    /// Poll every source and queue what they report. Returns how many triggers were queued.
    pub fn poll_sources(&mut self, now: Instant) -> usize {
        let mut observed = Vec::new();
        for source in &mut self.sources {
            match source.poll() {
                Ok(triggers) => observed.extend(triggers),
                Err(err) => warn!("event=source_poll_failed source={} reason=\"{err}\"", source.name()),
            }
        }
        observed
            .into_iter()
            .filter(|trigger| self.emit(*trigger, now))
            .count()
    }

    /// Number of queued triggers.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drain the queue into the controller, in arrival order.
    ///
    /// A failing trigger is logged and does not stop the rest of the queue.
    pub fn dispatch<S, H, C>(&mut self, controller: &mut GateController<S, H, C>) -> Vec<GateOutcome>
    where
        S: EntryStore,
        H: BlockingHost,
        C: Clock,
    {
        let mut outcomes = Vec::with_capacity(self.queue.len());
        while let Some(trigger) = self.queue.pop_front() {
            match controller.handle(trigger) {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => warn!("event=trigger_failed trigger={} reason=\"{err}\"", trigger.name()),
            }
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::SuppressReason;
    use crate::testing::{day, FixedClock, MemoryStore, RecordingHost, ScriptedSource};
    use scribe_core::{Configuration, CoreError, JournalEntry, ShowKind};

    fn controller() -> GateController<MemoryStore, RecordingHost, FixedClock> {
        GateController::new(
            MemoryStore::default(),
            RecordingHost::default(),
            FixedClock::new(day(19)),
            Configuration {
                setup_completed: true,
                ..Configuration::default()
            },
        )
    }

    #[test]
    fn identical_triggers_within_window_are_dropped() {
        let now = Instant::now();
        let mut router = EventRouter::new();

        assert!(router.emit(Trigger::ScreenUnlocked, now));
        assert!(!router.emit(Trigger::ScreenUnlocked, now + Duration::from_millis(500)));
        assert!(router.emit(Trigger::SessionUnlocked, now + Duration::from_millis(500)));
        assert!(router.emit(Trigger::ScreenUnlocked, now + Duration::from_secs(3)));
        assert_eq!(router.pending(), 3);
    }

    #[test]
    fn burst_of_triggers_presents_once() {
        let now = Instant::now();
        let mut router = EventRouter::new();
        let mut controller = controller();
        router.emit(Trigger::ScreenUnlocked, now);
        router.emit(Trigger::SessionUnlocked, now);
        router.emit(Trigger::AppReactivated, now);

        let outcomes = router.dispatch(&mut controller);

        assert_eq!(outcomes.len(), 3);
        assert!(matches!(outcomes[0], GateOutcome::Presented { .. }));
        assert_eq!(outcomes[1], GateOutcome::AlreadyPresenting);
        assert_eq!(outcomes[2], GateOutcome::AlreadyPresenting);
        assert_eq!(controller.host().enters, 1);
        assert_eq!(router.pending(), 0);
    }

    #[test]
    fn sources_feed_the_queue_and_errors_are_skipped() {
        let now = Instant::now();
        let mut router = EventRouter::new();
        router.subscribe(Box::new(ScriptedSource {
            batches: vec![Ok(vec![Trigger::ScreenUnlocked])],
        }));
        router.subscribe(Box::new(ScriptedSource {
            batches: vec![Err(CoreError::Io("loginctl missing".into()))],
        }));

        assert_eq!(router.source_names(), vec!["scripted", "scripted"]);
        assert_eq!(router.poll_sources(now), 1);
        assert_eq!(router.poll_sources(now), 0);
    }

    #[test]
    fn dispatch_respects_existing_entry() {
        let now = Instant::now();
        let mut router = EventRouter::new();
        let mut controller = controller();
        controller.store().insert(JournalEntry::new(day(19), "y", "t").unwrap());
        router.emit(Trigger::ScreenUnlocked, now);
        router.emit(Trigger::ExplicitShowRequest(ShowKind::Review), now);

        let outcomes = router.dispatch(&mut controller);

        assert_eq!(outcomes[0], GateOutcome::Suppressed(SuppressReason::EntryExists));
        assert!(matches!(
            outcomes[1],
            GateOutcome::Presented {
                kind: ShowKind::Review,
                ..
            }
        ));
    }
}
