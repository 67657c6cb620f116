//! Full-screen terminal ownership for the entry form.

use std::io::{self, Stdout};

use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use log::{info, warn};
use ratatui::backend::CrosstermBackend;
use ratatui::{Frame, Terminal};

use scribe_core::{BlockingHost, CoreError, CoreResult};

type Backend = CrosstermBackend<Stdout>;

/// Takes over the terminal (raw mode and alternate screen) while the form is shown.
#[derive(Default)]
pub struct TerminalHost {
    terminal: Option<Terminal<Backend>>,
}

impl TerminalHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.terminal.is_some()
    }

    /// Draw a frame. Does nothing while the terminal is not taken over.
    pub fn draw<F>(&mut self, render: F) -> io::Result<()>
    where
        F: FnOnce(&mut Frame),
    {
        if let Some(terminal) = self.terminal.as_mut() {
            terminal.draw(render)?;
        }
        Ok(())
    }
}

impl BlockingHost for TerminalHost {
    fn enter_blocking_mode(&mut self) -> CoreResult<()> {
        if self.terminal.is_some() {
            return Ok(());
        }
        let terminal = take_over().map_err(|err| {
            let _ = release(None);
            CoreError::Host(format!("unable to take over the terminal: {err}"))
        })?;
        self.terminal = Some(terminal);
        info!("event=terminal_taken_over");
        Ok(())
    }

    fn exit_blocking_mode(&mut self) -> CoreResult<()> {
        let Some(terminal) = self.terminal.take() else {
            return Ok(());
        };
        release(Some(terminal))
            .map_err(|err| CoreError::Host(format!("unable to restore the terminal: {err}")))?;
        info!("event=terminal_restored");
        Ok(())
    }
}

impl Drop for TerminalHost {
    fn drop(&mut self) {
        if let Some(terminal) = self.terminal.take() {
            if let Err(err) = release(Some(terminal)) {
                warn!("event=terminal_restore_failed reason=\"{err}\"");
            }
        }
    }
}

fn take_over() -> io::Result<Terminal<Backend>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    terminal.clear()?;
    Ok(terminal)
}

fn release(terminal: Option<Terminal<Backend>>) -> io::Result<()> {
    disable_raw_mode()?;
    match terminal {
        Some(mut terminal) => {
            execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
            terminal.show_cursor()?;
        }
        None => execute!(io::stdout(), LeaveAlternateScreen)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_host_ignores_exit_and_draw() {
        let mut host = TerminalHost::new();

        assert!(!host.is_active());
        host.exit_blocking_mode().expect("exit without enter");
        host.draw(|_| panic!("nothing to draw on")).expect("draw");
    }
}
