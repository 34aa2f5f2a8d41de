//! Local console: the keyboard and display being lent out.
//!
//! - **console**: the real terminal, raw mode via crossterm
//! - **keymap**: key event to wire byte translation
//! - **fake**: scripted console for tests and the demo mode

pub mod console;
pub mod fake;
pub mod keymap;

pub use console::TermConsole;
pub use fake::FakeConsole;
pub use keymap::{KeyMap, Modifiers};

use std::io;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("failed to configure terminal: {0}")]
    Setup(#[source] io::Error),

    #[error("failed to read key event: {0}")]
    Input(#[source] io::Error),

    #[error("failed to write to display: {0}")]
    Output(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, ConsoleError>;

/// The local keyboard and display.
pub trait Console {
    /// Poll for one keystroke, waiting at most `wait`. A single key may
    /// map to a short byte sequence (arrows and the like); the sequence
    /// is one unit and is never split downstream.
    fn poll_key(&mut self, wait: Duration) -> Result<Option<Vec<u8>>>;

    /// Write remote display bytes, in order.
    fn write_output(&mut self, bytes: &[u8]) -> Result<()>;

    /// Echo locally captured keystrokes.
    fn echo(&mut self, bytes: &[u8]) -> Result<()>;
}
