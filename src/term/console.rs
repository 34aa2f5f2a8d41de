//! Crossterm-backed console.

use std::io::{self, Stdout, Write};
use std::time::Duration;

use crossterm::cursor::{RestorePosition, SavePosition};
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal;

use super::{Console, ConsoleError, KeyMap, Result};

/// The local terminal, in raw mode for the lifetime of the session.
///
/// With local echo on, remote display writes are bracketed with cursor
/// restore/save so they continue where remote output last ended, while
/// echoed keystrokes keep their own position. The saved slot always holds
/// the remote output position; it is seeded once at startup.
pub struct TermConsole {
    stdout: Stdout,
    local_echo: bool,
}

impl TermConsole {
    pub fn new(local_echo: bool) -> Result<Self> {
        terminal::enable_raw_mode().map_err(ConsoleError::Setup)?;
        let mut stdout = io::stdout();
        if local_echo {
            execute!(stdout, SavePosition).map_err(ConsoleError::Setup)?;
        }
        Ok(Self { stdout, local_echo })
    }
}

impl Console for TermConsole {
    fn poll_key(&mut self, wait: Duration) -> Result<Option<Vec<u8>>> {
        if !event::poll(wait).map_err(ConsoleError::Input)? {
            return Ok(None);
        }
        match event::read().map_err(ConsoleError::Input)? {
            Event::Key(key) if key.kind == KeyEventKind::Press => Ok(KeyMap::map(&key)),
            _ => Ok(None),
        }
    }

    fn write_output(&mut self, bytes: &[u8]) -> Result<()> {
        if self.local_echo {
            execute!(self.stdout, RestorePosition).map_err(ConsoleError::Output)?;
        }
        self.stdout.write_all(bytes).map_err(ConsoleError::Output)?;
        if self.local_echo {
            execute!(self.stdout, SavePosition).map_err(ConsoleError::Output)?;
        }
        self.stdout.flush().map_err(ConsoleError::Output)
    }

    fn echo(&mut self, bytes: &[u8]) -> Result<()> {
        self.stdout.write_all(bytes).map_err(ConsoleError::Output)?;
        self.stdout.flush().map_err(ConsoleError::Output)
    }
}

impl Drop for TermConsole {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
