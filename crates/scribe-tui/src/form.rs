//! The morning entry form: editable state, key handling and rendering.

use chrono::NaiveDate;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use scribe_core::ShowKind;
use scribe_fs::long_date;

/// Multi-line text buffer with a cursor counted in characters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TextInput {
    content: String,
    cursor: usize,
}

impl TextInput {
    /// Buffer holding `content` with the cursor at the end.
    pub fn from(content: &str) -> Self {
        Self {
            content: content.to_string(),
            cursor: content.chars().count(),
        }
    }

    pub fn text(&self) -> &str {
        &self.content
    }

    pub fn insert(&mut self, c: char) {
        let index = self.byte_index();
        self.content.insert(index, c);
        self.cursor += 1;
    }

    pub fn delete_back(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let index = self.byte_index();
        self.content.remove(index);
    }

    pub fn delete_forward(&mut self) {
        if self.cursor < self.len() {
            let index = self.byte_index();
            self.content.remove(index);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor < self.len() {
            self.cursor += 1;
        }
    }

    /// Start of the current line.
    pub fn move_home(&mut self) {
        let (row, _) = self.cursor_position();
        self.cursor = self.index_of(row, 0);
    }

    /// End of the current line.
    pub fn move_end(&mut self) {
        let (row, _) = self.cursor_position();
        self.cursor = self.index_of(row, usize::MAX);
    }

    pub fn move_up(&mut self) {
        let (row, col) = self.cursor_position();
        if row > 0 {
            self.cursor = self.index_of(row - 1, col);
        }
    }

    pub fn move_down(&mut self) {
        let (row, col) = self.cursor_position();
        if row + 1 < self.content.split('\n').count() {
            self.cursor = self.index_of(row + 1, col);
        }
    }

    /// Zero-based (line, column) of the cursor.
    pub fn cursor_position(&self) -> (usize, usize) {
        let before: Vec<char> = self.content.chars().take(self.cursor).collect();
        let row = before.iter().filter(|c| **c == '\n').count();
        let col = before.iter().rev().take_while(|c| **c != '\n').count();
        (row, col)
    }

    fn len(&self) -> usize {
        self.content.chars().count()
    }

    fn byte_index(&self) -> usize {
        self.content
            .char_indices()
            .nth(self.cursor)
            .map_or(self.content.len(), |(index, _)| index)
    }

    // Column is clamped to the length of the target line.
    fn index_of(&self, row: usize, col: usize) -> usize {
        let mut index = 0;
        for (line_no, line) in self.content.split('\n').enumerate() {
            let width = line.chars().count();
            if line_no == row {
                return index + col.min(width);
            }
            index += width + 1;
        }
        self.len()
    }
}

/// Which answer has keyboard focus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Field {
    #[default]
    Yesterday,
    Today,
}

impl Field {
    fn toggle(self) -> Self {
        match self {
            Field::Yesterday => Field::Today,
            Field::Today => Field::Yesterday,
        }
    }
}

/// Text and focus of the open form, plus the latest status message.
#[derive(Debug, Default, Clone)]
pub struct FormState {
    pub yesterday: TextInput,
    pub today: TextInput,
    pub focus: Field,
    pub status: Option<String>,
}

impl FormState {
    pub fn new(yesterday_text: &str, today_text: &str) -> Self {
        Self {
            yesterday: TextInput::from(yesterday_text),
            today: TextInput::from(today_text),
            ..Self::default()
        }
    }

    /// Adopt text loaded elsewhere, keeping the cursor of any field that already matches.
    pub fn sync(&mut self, yesterday_text: &str, today_text: &str) {
        if self.yesterday.text() != yesterday_text {
            self.yesterday = TextInput::from(yesterday_text);
        }
        if self.today.text() != today_text {
            self.today = TextInput::from(today_text);
        }
    }

    fn focused_mut(&mut self) -> &mut TextInput {
        match self.focus {
            Field::Yesterday => &mut self.yesterday,
            Field::Today => &mut self.today,
        }
    }
}

/// What a key press asks the caller to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormAction {
    None,
    Edited,
    Save,
    Skip,
}

pub fn handle_key(form: &mut FormState, key: KeyEvent) -> FormAction {
    let control = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('s') if control => FormAction::Save,
        KeyCode::Esc => FormAction::Skip,
        KeyCode::Tab | KeyCode::BackTab => {
            form.focus = form.focus.toggle();
            FormAction::None
        }
        KeyCode::Enter => {
            form.focused_mut().insert('\n');
            FormAction::Edited
        }
        KeyCode::Backspace => {
            form.focused_mut().delete_back();
            FormAction::Edited
        }
        KeyCode::Delete => {
            form.focused_mut().delete_forward();
            FormAction::Edited
        }
        KeyCode::Left => {
            form.focused_mut().move_left();
            FormAction::None
        }
        KeyCode::Right => {
            form.focused_mut().move_right();
            FormAction::None
        }
        KeyCode::Up => {
            form.focused_mut().move_up();
            FormAction::None
        }
        KeyCode::Down => {
            form.focused_mut().move_down();
            FormAction::None
        }
        KeyCode::Home => {
            form.focused_mut().move_home();
            FormAction::None
        }
        KeyCode::End => {
            form.focused_mut().move_end();
            FormAction::None
        }
        KeyCode::Char(c) if !control => {
            form.focused_mut().insert(c);
            FormAction::Edited
        }
        _ => FormAction::None,
    }
}

/// Controller facts shown around the text fields.
#[derive(Clone, Copy, Debug)]
pub struct FormView {
    pub date: NaiveDate,
    pub kind: ShowKind,
    pub remaining: u32,
    pub can_save: bool,
}

pub fn render_form(frame: &mut Frame, form: &FormState, view: &FormView) {
    let outer = Block::default().borders(Borders::ALL).title("Sunrise Scribe");
    let inner = outer.inner(frame.size());
    frame.render_widget(outer, frame.size());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Length(1),
                Constraint::Min(3),
                Constraint::Length(1),
                Constraint::Min(3),
                Constraint::Length(1),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(inner);

    let subtitle = match view.kind {
        ShowKind::Gate => long_date(view.date),
        ShowKind::Review => format!("Reviewing your entry for {}", long_date(view.date)),
    };
    let heading = Paragraph::new(vec![
        Line::from(Span::styled(
            "Good morning!",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(subtitle),
    ]);
    frame.render_widget(heading, chunks[0]);

    frame.render_widget(Paragraph::new("What happened yesterday?"), chunks[1]);
    render_input(frame, chunks[2], &form.yesterday, form.focus == Field::Yesterday);
    frame.render_widget(Paragraph::new("Your hopes & dreams for today:"), chunks[3]);
    render_input(frame, chunks[4], &form.today, form.focus == Field::Today);

    if let Some(status) = &form.status {
        let status = Paragraph::new(Span::styled(status.as_str(), Style::default().fg(Color::Yellow)));
        frame.render_widget(status, chunks[5]);
    }

    render_guide_bar(frame, chunks[6], view);
}

fn render_input(frame: &mut Frame, area: Rect, input: &TextInput, focused: bool) {
    let border = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let block = Block::default().borders(Borders::ALL).border_style(border);
    let inner = block.inner(area);

    let (row, col) = input.cursor_position();
    let visible_rows = usize::from(inner.height.max(1));
    let scroll = row.saturating_sub(visible_rows - 1);
    let paragraph = Paragraph::new(input.text())
        .block(block)
        .scroll((u16::try_from(scroll).unwrap_or(u16::MAX), 0));
    frame.render_widget(paragraph, area);

    if focused && inner.width > 0 && inner.height > 0 {
        let x = u16::try_from(col).unwrap_or(u16::MAX).min(inner.width - 1);
        let y = u16::try_from(row - scroll).unwrap_or(u16::MAX).min(inner.height - 1);
        frame.set_cursor(inner.x + x, inner.y + y);
    }
}

fn render_guide_bar(frame: &mut Frame, area: Rect, view: &FormView) {
    let spans: Vec<Span> = key_hints(view)
        .into_iter()
        .flat_map(|(key, desc)| {
            vec![
                Span::styled(
                    format!(" [{key}] "),
                    Style::default().add_modifier(Modifier::BOLD).fg(Color::Cyan),
                ),
                Span::raw(format!("{desc}  ")),
            ]
        })
        .collect();

    let guide = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    frame.render_widget(guide, area);
}

fn key_hints(view: &FormView) -> Vec<(&'static str, String)> {
    let save = if view.can_save {
        "Save".to_string()
    } else {
        "Save (answer both)".to_string()
    };
    let skip = if view.remaining == 0 {
        "Skip for now".to_string()
    } else {
        format!("Skip in {}s", view.remaining)
    };
    vec![("Ctrl-S", save), ("Esc", skip), ("Tab", "Switch field".to_string())]
}
