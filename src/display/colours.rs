//! Colour management for terminal output
//!
//! Honours `NO_COLOR` and falls back to plain text when stdout is not a
//! terminal, unless colours are forced.

use std::io::IsTerminal;

use colored::{ColoredString, Colorize};

use crate::plugin::PluginState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColourMode {
    /// Colour when stdout is a terminal and `NO_COLOR` is unset
    Auto,
    Always,
    Never,
}

impl std::str::FromStr for ColourMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ColourMode::Auto),
            "always" => Ok(ColourMode::Always),
            "never" => Ok(ColourMode::Never),
            _ => Err(format!("Invalid colour mode: {}. Valid options: auto, always, never", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColourManager {
    enabled: bool,
}

impl ColourManager {
    pub fn new(mode: ColourMode) -> Self {
        let enabled = match mode {
            ColourMode::Always => true,
            ColourMode::Never => false,
            ColourMode::Auto => std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal(),
        };
        if mode == ColourMode::Always {
            // colored checks the terminal itself unless overridden
            colored::control::set_override(true);
        }
        Self { enabled }
    }

    pub fn with_colours(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn colours_enabled(&self) -> bool {
        self.enabled
    }

    pub fn error(&self, text: &str) -> ColoredString {
        self.paint(text, |t| t.red())
    }

    pub fn warning(&self, text: &str) -> ColoredString {
        self.paint(text, |t| t.yellow())
    }

    pub fn success(&self, text: &str) -> ColoredString {
        self.paint(text, |t| t.green())
    }

    pub fn info(&self, text: &str) -> ColoredString {
        self.paint(text, |t| t.blue())
    }

    pub fn highlight(&self, text: &str) -> ColoredString {
        self.paint(text, |t| t.cyan().bold())
    }

    pub fn muted(&self, text: &str) -> ColoredString {
        self.paint(text, |t| t.bright_black())
    }

    /// Colour a line according to a plugin's lifecycle state
    pub fn state(&self, state: PluginState, text: &str) -> ColoredString {
        match state {
            PluginState::Loaded => self.success(text),
            PluginState::Registered | PluginState::Enabled => self.warning(text),
            PluginState::Stopped | PluginState::Disabled => self.muted(text),
        }
    }

    fn paint<F>(&self, text: &str, style: F) -> ColoredString
    where
        F: FnOnce(&str) -> ColoredString,
    {
        if self.enabled {
            style(text)
        } else {
            text.normal()
        }
    }
}

impl Default for ColourManager {
    fn default() -> Self {
        Self::new(ColourMode::Auto)
    }
}
