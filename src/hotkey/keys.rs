//! Key and modifier parsing
//!
//! Turns the `key` / `modifiers` strings of a mask entry into a
//! [`HotKey`] that the OS hotkey manager can register.

use std::fmt;

use global_hotkey::hotkey::{Code, HotKey, Modifiers};

use super::HotkeyError;
use crate::config::MaskConfig;

/// Tracks which modifier keys a binding requires
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierSet {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    /// Windows / Super / Command key
    pub win: bool,
}

impl ModifierSet {
    /// Parse modifier names, case-insensitively.
    ///
    /// An unknown name rejects the whole set.
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self, HotkeyError> {
        let mut set = Self::default();
        for name in names {
            let name = name.as_ref();
            match name.trim().to_ascii_lowercase().as_str() {
                "ctrl" | "control" => set.ctrl = true,
                "shift" => set.shift = true,
                "alt" | "option" => set.alt = true,
                "win" | "super" | "cmd" | "command" => set.win = true,
                _ => return Err(HotkeyError::UnknownModifier(name.to_string())),
            }
        }
        Ok(set)
    }

    /// Check if no modifier is required
    pub fn is_empty(&self) -> bool {
        !self.ctrl && !self.shift && !self.alt && !self.win
    }

    /// Convert to the hotkey manager's modifier flags
    pub fn to_modifiers(self) -> Option<Modifiers> {
        if self.is_empty() {
            return None;
        }
        let mut mods = Modifiers::empty();
        if self.ctrl {
            mods |= Modifiers::CONTROL;
        }
        if self.shift {
            mods |= Modifiers::SHIFT;
        }
        if self.alt {
            mods |= Modifiers::ALT;
        }
        if self.win {
            mods |= Modifiers::SUPER;
        }
        Some(mods)
    }
}

impl fmt::Display for ModifierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (self.ctrl, "Ctrl"),
            (self.shift, "Shift"),
            (self.alt, "Alt"),
            (self.win, "Win"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect();
        write!(f, "{}", names.join("+"))
    }
}

/// Parse a key name: letters, digits, F1-F12 or Space
pub fn parse_key(name: &str) -> Result<Code, HotkeyError> {
    let upper = name.trim().to_ascii_uppercase();
    let code = match upper.as_str() {
        "A" => Code::KeyA,
        "B" => Code::KeyB,
        "C" => Code::KeyC,
        "D" => Code::KeyD,
        "E" => Code::KeyE,
        "F" => Code::KeyF,
        "G" => Code::KeyG,
        "H" => Code::KeyH,
        "I" => Code::KeyI,
        "J" => Code::KeyJ,
        "K" => Code::KeyK,
        "L" => Code::KeyL,
        "M" => Code::KeyM,
        "N" => Code::KeyN,
        "O" => Code::KeyO,
        "P" => Code::KeyP,
        "Q" => Code::KeyQ,
        "R" => Code::KeyR,
        "S" => Code::KeyS,
        "T" => Code::KeyT,
        "U" => Code::KeyU,
        "V" => Code::KeyV,
        "W" => Code::KeyW,
        "X" => Code::KeyX,
        "Y" => Code::KeyY,
        "Z" => Code::KeyZ,
        "0" => Code::Digit0,
        "1" => Code::Digit1,
        "2" => Code::Digit2,
        "3" => Code::Digit3,
        "4" => Code::Digit4,
        "5" => Code::Digit5,
        "6" => Code::Digit6,
        "7" => Code::Digit7,
        "8" => Code::Digit8,
        "9" => Code::Digit9,
        "F1" => Code::F1,
        "F2" => Code::F2,
        "F3" => Code::F3,
        "F4" => Code::F4,
        "F5" => Code::F5,
        "F6" => Code::F6,
        "F7" => Code::F7,
        "F8" => Code::F8,
        "F9" => Code::F9,
        "F10" => Code::F10,
        "F11" => Code::F11,
        "F12" => Code::F12,
        "SPACE" => Code::Space,
        _ => return Err(HotkeyError::UnknownKey(name.to_string())),
    };
    Ok(code)
}

/// A mask's parsed hotkey
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub mask: String,
    pub key: String,
    pub modifiers: ModifierSet,
    pub hotkey: HotKey,
}

impl Binding {
    /// Parse the hotkey section of a mask entry
    pub fn from_config(mask: &MaskConfig) -> Result<Self, HotkeyError> {
        let modifiers = ModifierSet::parse(&mask.hotkey.modifiers)?;
        let code = parse_key(&mask.hotkey.key)?;

        Ok(Self {
            mask: mask.name.clone(),
            key: mask.hotkey.key.trim().to_ascii_uppercase(),
            modifiers,
            hotkey: HotKey::new(modifiers.to_modifiers(), code),
        })
    }

    /// Id the hotkey manager reports in its events
    pub fn id(&self) -> u32 {
        self.hotkey.id()
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.is_empty() {
            write!(f, "{}", self.key)
        } else {
            write!(f, "{}+{}", self.modifiers, self.key)
        }
    }
}
