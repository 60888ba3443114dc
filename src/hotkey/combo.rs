//! Hotkey combination parsing
//!
//! Combinations are written as `Mod+Mod+Key`, e.g. `Ctrl+Alt+K`. Modifier
//! bits and key codes use the values the OS hotkey API expects.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::debug;

bitflags! {
    /// Modifier key set, laid out as the OS hotkey bitmask
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u32 {
        const ALT = 0x0001;
        const CONTROL = 0x0002;
        const SHIFT = 0x0004;
        const WIN = 0x0008;
    }
}

/// Key used when a combination names none
pub const DEFAULT_KEY: char = 'K';

/// A parsed modifier set plus one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HotkeyCombination {
    pub modifiers: Modifiers,
    /// Single character; ASCII letters are upper-cased
    pub key: char,
}

impl HotkeyCombination {
    pub fn new(modifiers: Modifiers, key: char) -> Self {
        Self {
            modifiers,
            key: key.to_ascii_uppercase(),
        }
    }

    /// Parse text like `alt+shift+P`
    ///
    /// Tokens are case-insensitive. Unknown tokens are skipped; the last
    /// single-character token is the key, `K` if there is none.
    pub fn parse(text: &str) -> Self {
        let mut modifiers = Modifiers::empty();
        let mut key = None;

        for token in text.split('+') {
            let token = token.trim().to_ascii_lowercase();
            match token.as_str() {
                "ctrl" | "control" => modifiers |= Modifiers::CONTROL,
                "alt" => modifiers |= Modifiers::ALT,
                "shift" => modifiers |= Modifiers::SHIFT,
                "win" => modifiers |= Modifiers::WIN,
                _ => {
                    let mut chars = token.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => key = Some(c),
                        _ => debug!(token, "ignoring hotkey token"),
                    }
                }
            }
        }

        Self::new(modifiers, key.unwrap_or(DEFAULT_KEY))
    }

    /// Virtual-key code of the key, if it has one
    ///
    /// Letters and digits map to their ASCII code. Punctuation maps to the
    /// `VK_OEM_*` code of its key on a US layout.
    pub fn virtual_key(&self) -> Option<u32> {
        let code = match self.key {
            c if c.is_ascii_alphanumeric() => c as u32,
            ';' => 0xBA,
            '=' => 0xBB,
            ',' => 0xBC,
            '-' => 0xBD,
            '.' => 0xBE,
            '/' => 0xBF,
            '`' => 0xC0,
            '[' => 0xDB,
            '\\' => 0xDC,
            ']' => 0xDD,
            '\'' => 0xDE,
            _ => return None,
        };
        Some(code)
    }
}

impl Default for HotkeyCombination {
    fn default() -> Self {
        Self::new(Modifiers::CONTROL | Modifiers::ALT, DEFAULT_KEY)
    }
}

impl FromStr for HotkeyCombination {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for HotkeyCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Modifiers::CONTROL, "Ctrl"),
            (Modifiers::ALT, "Alt"),
            (Modifiers::SHIFT, "Shift"),
            (Modifiers::WIN, "Win"),
        ];
        for (flag, name) in names {
            if self.modifiers.contains(flag) {
                write!(f, "{name}+")?;
            }
        }
        write!(f, "{}", self.key)
    }
}

impl Serialize for HotkeyCombination {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HotkeyCombination {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Self::parse(&text))
    }
}
