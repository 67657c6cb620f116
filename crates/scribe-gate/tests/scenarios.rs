use std::cell::Cell;
use std::fs;
use std::time::Instant;

use chrono::NaiveDate;
use tempfile::TempDir;

use scribe_core::{BlockingHost, Clock, Configuration, CoreResult, EntryStore, ShowKind, Trigger};
use scribe_fs::FsEntryStore;
use scribe_gate::{ContentSource, EventRouter, GateController, GateOutcome, SuppressReason};

#[derive(Debug, Default)]
struct CountingHost {
    enters: usize,
    exits: usize,
}

impl BlockingHost for CountingHost {
    fn enter_blocking_mode(&mut self) -> CoreResult<()> {
        self.enters += 1;
        Ok(())
    }

    fn exit_blocking_mode(&mut self) -> CoreResult<()> {
        self.exits += 1;
        Ok(())
    }
}

#[derive(Debug)]
struct SettableClock(Cell<NaiveDate>);

impl Clock for SettableClock {
    fn today(&self) -> NaiveDate {
        self.0.get()
    }
}

type Controller = GateController<FsEntryStore, CountingHost, SettableClock>;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
}

fn controller(temp: &TempDir) -> Controller {
    GateController::new(
        FsEntryStore::at(temp.path().join("entries")),
        CountingHost::default(),
        SettableClock(Cell::new(day(19))),
        Configuration {
            setup_completed: true,
            ..Configuration::default()
        },
    )
}

fn wait_out(controller: &mut Controller) {
    while controller.tick() {}
}

#[test]
fn fresh_day_presents_empty_form_with_full_countdown() {
    let temp = TempDir::new().expect("temp dir");
    let mut controller = controller(&temp);

    let outcome = controller.handle(Trigger::ScreenUnlocked).unwrap();

    assert_eq!(
        outcome,
        GateOutcome::Presented {
            kind: ShowKind::Gate,
            source: ContentSource::Empty
        }
    );
    assert_eq!(controller.countdown().remaining(), 30);
    assert!(!controller.can_skip());
}

#[test]
fn deferred_draft_returns_on_next_trigger_with_fresh_countdown() {
    let temp = TempDir::new().expect("temp dir");
    let mut controller = controller(&temp);
    controller.handle(Trigger::ScreenUnlocked).unwrap();
    controller.update_text("draft-y", "draft-t").unwrap();
    wait_out(&mut controller);
    controller.defer().unwrap();
    assert!(!controller.store().exists(day(19)));

    controller.handle(Trigger::AppReactivated).unwrap();

    let presentation = controller.presentation().unwrap();
    assert_eq!(presentation.source, ContentSource::Draft);
    assert_eq!(presentation.yesterday_text, "draft-y");
    assert_eq!(presentation.today_text, "draft-t");
    assert_eq!(controller.countdown().remaining(), 30);
}

#[test]
fn saved_entry_is_written_and_stops_gating() {
    let temp = TempDir::new().expect("temp dir");
    let mut controller = controller(&temp);
    controller.handle(Trigger::SessionUnlocked).unwrap();
    controller.update_text("Y", "T").unwrap();

    let path = controller.save().unwrap();

    assert_eq!(path, temp.path().join("entries").join("2026-10-19.txt"));
    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains("## Reflections on October 18, 2026\nY\n"));
    assert!(contents.contains("## Hopes & dreams for October 19, 2026\nT\n"));
    assert_eq!(
        controller.handle(Trigger::ScreenUnlocked).unwrap(),
        GateOutcome::Suppressed(SuppressReason::EntryExists)
    );
    assert_eq!(controller.host().enters, 1);
    assert_eq!(controller.host().exits, 1);
}

#[test]
fn rollover_discards_previous_days_draft() {
    let temp = TempDir::new().expect("temp dir");
    let mut controller = controller(&temp);
    controller.handle(Trigger::ScreenUnlocked).unwrap();
    controller.update_text("stale-y", "stale-t").unwrap();
    wait_out(&mut controller);
    controller.defer().unwrap();

    controller.clock().0.set(day(20));
    let outcome = controller.handle(Trigger::ScreenUnlocked).unwrap();

    assert_eq!(
        outcome,
        GateOutcome::Presented {
            kind: ShowKind::Gate,
            source: ContentSource::Empty
        }
    );
    assert_eq!(controller.presentation().unwrap().yesterday_text, "");
}

#[test]
fn review_prefills_from_file_and_resaves_unchanged() {
    let temp = TempDir::new().expect("temp dir");
    let mut controller = controller(&temp);
    controller.handle(Trigger::ScreenUnlocked).unwrap();
    controller.update_text("walked", "write").unwrap();
    let path = controller.save().unwrap();
    let before = fs::read_to_string(&path).unwrap();

    let outcome = controller
        .handle(Trigger::ExplicitShowRequest(ShowKind::Review))
        .unwrap();

    assert_eq!(
        outcome,
        GateOutcome::Presented {
            kind: ShowKind::Review,
            source: ContentSource::File
        }
    );
    assert!(controller.can_save());
    controller.save().unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn legacy_file_counts_as_written_and_reviews_cleanly() {
    let temp = TempDir::new().expect("temp dir");
    let entries = temp.path().join("entries");
    fs::create_dir_all(&entries).unwrap();
    fs::write(entries.join("2026-10-19.txt"), "## Yesterday\nold style\n\n## Today\nstill works").unwrap();
    let mut controller = controller(&temp);

    assert_eq!(
        controller.gate_show().unwrap(),
        GateOutcome::Suppressed(SuppressReason::EntryExists)
    );
    controller.review_show().unwrap();

    let presentation = controller.presentation().unwrap();
    assert_eq!(presentation.yesterday_text, "old style");
    assert_eq!(presentation.today_text, "still works");
}

#[test]
fn router_debounces_and_feeds_controller() {
    let temp = TempDir::new().expect("temp dir");
    let mut controller = controller(&temp);
    let mut router = EventRouter::new();
    let now = Instant::now();

    router.emit(Trigger::ScreenUnlocked, now);
    router.emit(Trigger::ScreenUnlocked, now);
    router.emit(Trigger::SessionUnlocked, now);
    let outcomes = router.dispatch(&mut controller);

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[1], GateOutcome::AlreadyPresenting);
    assert_eq!(controller.host().enters, 1);
    assert!(controller.countdown().is_running());
}
