// Shared types module - Common types used across both panels

use anyhow::Result;
use std::fmt;
use std::str::FromStr;

// Panel exit reason - used to determine if we should quit, switch panels or reload config
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PanelExit {
    UserQuit,       // User pressed 'q' or Ctrl+C - should exit app
    SwitchPanel,    // User pressed Tab - should show the other panel
    ConfigChanged,  // Config file changed on disk - should reload and restart the panel
}

// Which panel is on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelKind {
    Command,
    Parameters,
}

impl PanelKind {
    pub fn other(self) -> Self {
        match self {
            PanelKind::Command => PanelKind::Parameters,
            PanelKind::Parameters => PanelKind::Command,
        }
    }
}

impl FromStr for PanelKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "command" | "commands" => Ok(PanelKind::Command),
            "parameters" | "parameter" | "params" => Ok(PanelKind::Parameters),
            other => anyhow::bail!("Unknown panel: {} (expected 'command' or 'parameters')", other),
        }
    }
}

impl fmt::Display for PanelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanelKind::Command => write!(f, "command"),
            PanelKind::Parameters => write!(f, "parameters"),
        }
    }
}

// RGB color representation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Parse a `#RRGGBB` (or bare `RRGGBB`) color-picker value into 8-bit channels
    pub fn from_hex(hex: &str) -> Result<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            anyhow::bail!("Invalid hex color: {}", hex);
        }
        Ok(Rgb {
            r: u8::from_str_radix(&hex[0..2], 16)?,
            g: u8::from_str_radix(&hex[2..4], 16)?,
            b: u8::from_str_radix(&hex[4..6], 16)?,
        })
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}
