//! Configuration management for auxterm.
//!
//! Settings load from `~/.auxterm/config.toml`; anything the file leaves
//! out keeps its default, and command-line flags override the file.
//!
//! ```toml
//! # Device to attach (may also be given on the command line)
//! device = "/dev/ttyUSB0"
//!
//! # Servicing mode: "poll" or "blocking"
//! mode = "poll"
//!
//! # Largest frame payload accepted or sent, in bytes
//! max_frame = 8192
//!
//! # Keystroke buffer capacity
//! key_buffer = 64
//!
//! # Poll cadence in milliseconds (poll mode only)
//! poll_interval_ms = 10
//!
//! # Echo keystrokes to the local display
//! local_echo = true
//!
//! # Identification string returned to the host
//! termspec = "auxterm vt100"
//!
//! # End the session after this many seconds without a packet
//! idle_timeout_secs = 300
//! ```

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::session::LoopMode;

/// Main configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device or socket to attach
    pub device: Option<String>,
    /// Servicing mode name: "poll" or "blocking"
    pub mode: String,
    /// Largest frame payload accepted or sent
    pub max_frame: usize,
    /// Keystroke buffer capacity
    pub key_buffer: usize,
    /// Poll cadence in milliseconds
    pub poll_interval_ms: u64,
    /// Echo keystrokes to the local display
    pub local_echo: bool,
    /// Identification string returned to the host
    pub termspec: Option<String>,
    /// End the session after this many seconds without a packet
    pub idle_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: None,
            mode: "poll".to_string(),
            max_frame: 8192,
            key_buffer: 64,
            poll_interval_ms: 10,
            local_echo: true,
            termspec: None,
            idle_timeout_secs: None,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Self {
        if let Some(path) = Self::get_config_path() {
            if path.exists() {
                if let Ok(content) = fs::read_to_string(&path) {
                    if let Ok(config) = toml::from_str(&content) {
                        return config;
                    }
                }
            }
        }
        Self::default()
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        if let Some(home) = home_dir() {
            let auxterm_dir = home.join(".auxterm");
            if !auxterm_dir.exists() {
                let _ = fs::create_dir_all(&auxterm_dir);
            }
            return Some(auxterm_dir.join("config.toml"));
        }
        None
    }

    /// Resolve the servicing mode name
    pub fn loop_mode(&self) -> LoopMode {
        match self.mode.as_str() {
            "blocking" => LoopMode::Blocking,
            _ => LoopMode::Poll,
        }
    }

    /// Check the settings for combinations the protocol cannot honor
    pub fn validate(&self) -> Result<(), String> {
        if self.max_frame < 2 {
            return Err(format!(
                "max_frame must be at least 2 to carry a packet header, got {}",
                self.max_frame
            ));
        }
        if self.key_buffer + 2 > self.max_frame {
            return Err(format!(
                "key_buffer ({}) plus the packet header does not fit in max_frame ({})",
                self.key_buffer, self.max_frame
            ));
        }
        match self.mode.as_str() {
            "poll" | "blocking" => Ok(()),
            other => Err(format!(
                "unknown mode '{}', expected 'poll' or 'blocking'",
                other
            )),
        }
    }
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}
