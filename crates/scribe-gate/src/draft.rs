//! In-memory holder for deferred text.

use chrono::NaiveDate;
use log::debug;

use scribe_core::Draft;

/// Keeps at most one unsaved draft, valid only for the date it was captured on.
#[derive(Debug, Default)]
pub struct DraftCache {
    draft: Option<Draft>,
}

impl DraftCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached draft. Blank text leaves no draft behind.
    pub fn store(&mut self, date: NaiveDate, yesterday_text: impl Into<String>, today_text: impl Into<String>) {
        let draft = Draft::new(date, yesterday_text, today_text);
        if draft.is_empty() {
            self.draft = None;
            debug!("event=draft_cleared date={date} reason=blank");
            return;
        }
        self.draft = Some(draft);
        debug!("event=draft_stored date={date}");
    }

    /// Return the draft for `date`. A draft from any other date is dropped.
    pub fn load(&mut self, date: NaiveDate) -> Option<Draft> {
        match &self.draft {
            Some(draft) if draft.date == date => Some(draft.clone()),
            Some(stale) => {
                debug!("event=draft_discarded draft_date={} today={date}", stale.date);
                self.draft = None;
                None
            }
            None => None,
        }
    }

    /// Drop the cached draft.
    pub fn clear(&mut self) {
        self.draft = None;
    }

    /// Whether a draft is held, regardless of its date.
    pub fn is_empty(&self) -> bool {
        self.draft.is_none()
    }
}
