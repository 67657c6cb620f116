//! Fakes for exercising the controller without a disk or a terminal.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::PathBuf;

use chrono::NaiveDate;

use scribe_core::{BlockingHost, Clock, CoreError, CoreResult, EntryStore, JournalEntry, Trigger, TriggerSource};

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<NaiveDate, JournalEntry>>,
    writes: Cell<usize>,
    fail_writes: Cell<bool>,
}

impl MemoryStore {
    pub fn insert(&self, entry: JournalEntry) {
        self.entries.borrow_mut().insert(entry.date(), entry);
    }

    pub fn get(&self, date: NaiveDate) -> Option<JournalEntry> {
        self.entries.borrow().get(&date).cloned()
    }

    pub fn writes(&self) -> usize {
        self.writes.get()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }
}

impl EntryStore for MemoryStore {
    fn exists(&self, date: NaiveDate) -> bool {
        self.entries.borrow().contains_key(&date)
    }

    fn read(&self, date: NaiveDate) -> CoreResult<Option<JournalEntry>> {
        Ok(self.get(date))
    }

    fn write(&self, entry: &JournalEntry) -> CoreResult<PathBuf> {
        if self.fail_writes.get() {
            return Err(CoreError::Io("disk full".into()));
        }
        self.writes.set(self.writes.get() + 1);
        self.insert(entry.clone());
        Ok(PathBuf::from(format!("{}.txt", entry.date())))
    }
}

#[derive(Debug, Default)]
pub struct RecordingHost {
    pub enters: usize,
    pub exits: usize,
    pub fail_enter: bool,
}

impl BlockingHost for RecordingHost {
    fn enter_blocking_mode(&mut self) -> CoreResult<()> {
        if self.fail_enter {
            return Err(CoreError::Host("no display".into()));
        }
        self.enters += 1;
        Ok(())
    }

    fn exit_blocking_mode(&mut self) -> CoreResult<()> {
        self.exits += 1;
        Ok(())
    }
}

#[derive(Debug)]
pub struct FixedClock(Cell<NaiveDate>);

impl FixedClock {
    pub fn new(date: NaiveDate) -> Self {
        Self(Cell::new(date))
    }

    pub fn set(&self, date: NaiveDate) {
        self.0.set(date);
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0.get()
    }
}

/// Source that replays a fixed list of batches, one per poll.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    pub batches: Vec<CoreResult<Vec<Trigger>>>,
}

impl TriggerSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn poll(&mut self) -> CoreResult<Vec<Trigger>> {
        if self.batches.is_empty() {
            return Ok(Vec::new());
        }
        self.batches.remove(0)
    }
}
