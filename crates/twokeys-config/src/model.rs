//! Configuration data model

use std::fmt;
use std::path::PathBuf;

/// Upper bound (exclusive) of key codes the detector assigns symbols to.
pub const MAX_KEY_MAPS: u16 = 250;

/// Port the twokeys server listens on unless configured otherwise.
pub const DEFAULT_SERVER_PORT: u16 = 9090;

/// Root configuration structure
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub global: GlobalConfig,
    pub keyboards: Vec<KeyboardConfig>,
}

impl Config {
    /// Look up a keyboard block by name.
    pub fn keyboard(&self, name: &str) -> Option<&KeyboardConfig> {
        self.keyboards.iter().find(|keyboard| keyboard.name == name)
    }
}

/// Global settings
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    pub server: ServerConfig,
    /// Whether keyboards may be grabbed for exclusive access.
    pub lock_keyboards: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            lock_keyboards: true,
        }
    }
}

/// Address of the server hotkeys are reported to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_SERVER_PORT,
        }
    }
}

/// One logical keyboard, possibly backed by several device files
#[derive(Debug, Clone)]
pub struct KeyboardConfig {
    pub name: String,
    /// Input device files (e.g. `/dev/input/by-id/...-event-kbd`)
    pub paths: Vec<PathBuf>,
    /// Custom token -> key code overrides, in file order
    pub map: Vec<(String, u16)>,
    /// Hotkey table, in file order. The matcher scans it in this order.
    pub hotkeys: Vec<(String, HotkeyEntry)>,
}

/// When a hotkey fires relative to the key event that completes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HotkeyType {
    /// Fire on key press
    Down,
    /// Fire on key release
    Up,
    /// Fire on both; the server picks the function
    Multi,
    /// Unrecognized type from the config file. Never fires.
    Unknown(String),
}

impl HotkeyType {
    /// Parse a type name (case-insensitive). Unrecognized names are kept.
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "down" => Self::Down,
            "up" => Self::Up,
            "multi" => Self::Multi,
            _ => Self::Unknown(name.to_string()),
        }
    }
}

impl fmt::Display for HotkeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HotkeyType::Down => write!(f, "down"),
            HotkeyType::Up => write!(f, "up"),
            HotkeyType::Multi => write!(f, "multi"),
            HotkeyType::Unknown(name) => write!(f, "{}", name),
        }
    }
}

/// The function(s) a hotkey runs on the server. Opaque to the detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HotkeyAction {
    /// A single function name
    Function(String),
    /// Separate functions for press and release (used by `multi` hotkeys)
    PerEvent {
        down: Option<String>,
        up: Option<String>,
    },
}

/// A normalized hotkey definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotkeyEntry {
    pub kind: HotkeyType,
    pub action: HotkeyAction,
}

impl HotkeyEntry {
    /// Shorthand hotkey: a bare function name fires on key press.
    pub fn down(function: impl Into<String>) -> Self {
        Self {
            kind: HotkeyType::Down,
            action: HotkeyAction::Function(function.into()),
        }
    }
}
