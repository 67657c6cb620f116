//! The two-section plain-text entry layout.

use chrono::NaiveDate;

use scribe_core::{CoreError, CoreResult, JournalEntry};

const YESTERDAY_PREFIX: &str = "## Reflections on";
const TODAY_PREFIX: &str = "## Hopes & dreams for";
const LEGACY_YESTERDAY: &str = "## Yesterday";
const LEGACY_TODAY: &str = "## Today";

/// File name for a date's entry, e.g. `2026-10-19.txt`.
pub fn entry_file_name(date: NaiveDate) -> String {
    format!("{}.txt", date.format("%Y-%m-%d"))
}

/// Long-form date used in section headings, e.g. `October 19, 2026`.
pub fn long_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

/// Render an entry into its on-disk text.
pub fn render_entry(entry: &JournalEntry) -> String {
    let date = entry.date();
    let yesterday = date.pred_opt().unwrap_or(date);
    let mut content = String::new();
    content.push_str(&format!("{YESTERDAY_PREFIX} {}\n", long_date(yesterday)));
    content.push_str(entry.yesterday_text());
    content.push_str(&format!("\n\n{TODAY_PREFIX} {}\n", long_date(date)));
    content.push_str(entry.today_text());
    content.push('\n');
    content
}

/// Split file contents into the two sections.
///
/// The split is the heading dated for `date` itself, so answers that quote a
/// heading stay intact. A dated heading for another day comes next, and the
/// legacy `## Yesterday` / `## Today` pair is only used when no dated heading
/// exists. Fails with `ParseMismatch` when no second heading is found.
pub fn parse_entry(date: NaiveDate, contents: &str) -> CoreResult<JournalEntry> {
    let lines: Vec<&str> = contents.lines().collect();
    let split = find_today_heading(&lines, date)
        .ok_or_else(|| CoreError::ParseMismatch(format!("no today heading in {}", entry_file_name(date))))?;

    let mut yesterday = &lines[..split];
    if let Some(first) = yesterday.iter().position(|line| !line.trim().is_empty()) {
        if is_yesterday_heading(yesterday[first]) {
            yesterday = &yesterday[first + 1..];
        }
    }
    let today = &lines[split + 1..];

    Ok(JournalEntry::recovered(
        date,
        yesterday.join("\n"),
        today.join("\n"),
    ))
}

/// Parse contents, treating a layout mismatch as "everything is today's text".
pub fn parse_entry_lenient(date: NaiveDate, contents: &str) -> JournalEntry {
    match parse_entry(date, contents) {
        Ok(entry) => entry,
        Err(err) => {
            log::warn!("event=entry_parse_fallback date={date} reason=\"{err}\"");
            JournalEntry::recovered(date, "", contents)
        }
    }
}

fn is_yesterday_heading(line: &str) -> bool {
    let line = line.trim();
    line.starts_with(YESTERDAY_PREFIX) || line == LEGACY_YESTERDAY
}

fn find_today_heading(lines: &[&str], date: NaiveDate) -> Option<usize> {
    let exact = format!("{TODAY_PREFIX} {}", long_date(date));
    lines
        .iter()
        .position(|line| line.trim() == exact)
        .or_else(|| lines.iter().position(|line| line.trim().starts_with(TODAY_PREFIX)))
        .or_else(|| lines.iter().position(|line| line.trim() == LEGACY_TODAY))
}
