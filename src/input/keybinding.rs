//! Keybindings
//!
//! A binding maps an exact chord (modifier set + keysym or pointer button)
//! to a shell action. Chords are written the way users type them in the
//! configuration file, e.g. `Super+Return` or `Alt+Shift+BTN_LEFT`.

use std::collections::HashMap;
use std::fmt;

use log::warn;
use serde::Deserialize;
use thiserror::Error;
use xkbcommon::xkb;

// Modifier mask, bit-compatible with the provider's keyboard modifier state
bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u32 {
        const SHIFT = 1;
        const CAPS_LOCK = 2;
        const CTRL = 4;
        const ALT = 8;
        const NUM_LOCK = 16;
        const LOGO = 64;
    }
}

impl Modifiers {
    /// Modifiers that take part in chord matching; lock keys never do
    pub const BINDING_MASK: Modifiers = Modifiers::SHIFT
        .union(Modifiers::CTRL)
        .union(Modifiers::ALT)
        .union(Modifiers::LOGO);

    /// Strip lock modifiers
    pub fn for_binding(self) -> Modifiers {
        self & Self::BINDING_MASK
    }

    fn from_modifier_name(name: &str) -> Option<Modifiers> {
        match name.to_ascii_lowercase().as_str() {
            "super" | "logo" | "mod4" | "win" => Some(Modifiers::LOGO),
            "alt" | "mod1" => Some(Modifiers::ALT),
            "ctrl" | "control" => Some(Modifiers::CTRL),
            "shift" => Some(Modifiers::SHIFT),
            _ => None,
        }
    }
}

/// Linux input event codes for pointer buttons
pub mod buttons {
    pub const BTN_LEFT: u32 = 0x110;
    pub const BTN_RIGHT: u32 = 0x111;
    pub const BTN_MIDDLE: u32 = 0x112;
    pub const BTN_SIDE: u32 = 0x113;
    pub const BTN_EXTRA: u32 = 0x114;

    pub(super) const NAMES: [(&str, u32); 5] = [
        ("BTN_LEFT", BTN_LEFT),
        ("BTN_RIGHT", BTN_RIGHT),
        ("BTN_MIDDLE", BTN_MIDDLE),
        ("BTN_SIDE", BTN_SIDE),
        ("BTN_EXTRA", BTN_EXTRA),
    ];
}

/// What completes a chord
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// XKB keysym
    Keysym(u32),
    /// Pointer button code
    Button(u32),
}

/// Errors from parsing a chord string
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChordError {
    #[error("empty chord")]
    Empty,
    #[error("empty segment in chord {0:?}")]
    EmptySegment(String),
    #[error("unknown modifier {0:?}")]
    UnknownModifier(String),
    #[error("unknown key {0:?}")]
    UnknownKey(String),
}

/// Modifier set + trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyChord {
    pub modifiers: Modifiers,
    pub trigger: Trigger,
}

impl KeyChord {
    /// Chord for a keysym
    pub fn key(modifiers: Modifiers, keysym: u32) -> Self {
        Self {
            modifiers: modifiers.for_binding(),
            trigger: Trigger::Keysym(canonical_keysym(keysym)),
        }
    }

    /// Chord for a pointer button
    pub fn button(modifiers: Modifiers, button: u32) -> Self {
        Self {
            modifiers: modifiers.for_binding(),
            trigger: Trigger::Button(button),
        }
    }

    /// Parse `Mod+Mod+Key`
    pub fn parse(chord: &str) -> Result<Self, ChordError> {
        let chord = chord.trim();
        if chord.is_empty() {
            return Err(ChordError::Empty);
        }

        let segments: Vec<&str> = chord.split('+').map(str::trim).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(ChordError::EmptySegment(chord.to_string()));
        }
        let (key, modifier_names) = segments
            .split_last()
            .ok_or(ChordError::Empty)?;

        let mut modifiers = Modifiers::empty();
        for name in modifier_names {
            modifiers |= Modifiers::from_modifier_name(name)
                .ok_or_else(|| ChordError::UnknownModifier(name.to_string()))?;
        }

        if let Some((_, code)) = buttons::NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
        {
            return Ok(Self::button(modifiers, *code));
        }

        Ok(Self::key(modifiers, keysym_from_name(key)?))
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, name) in [
            (Modifiers::LOGO, "Super"),
            (Modifiers::CTRL, "Ctrl"),
            (Modifiers::ALT, "Alt"),
            (Modifiers::SHIFT, "Shift"),
        ] {
            if self.modifiers.contains(flag) {
                write!(f, "{}+", name)?;
            }
        }
        match self.trigger {
            Trigger::Keysym(keysym) => write!(f, "{}", xkb::keysym_get_name(keysym.into())),
            Trigger::Button(code) => match buttons::NAMES.iter().find(|(_, c)| *c == code) {
                Some((name, _)) => write!(f, "{}", name),
                None => write!(f, "button:{:#x}", code),
            },
        }
    }
}

/// Resolve a keysym name, preferring the exact spelling
fn keysym_from_name(name: &str) -> Result<u32, ChordError> {
    [xkb::KEYSYM_NO_FLAGS, xkb::KEYSYM_CASE_INSENSITIVE]
        .into_iter()
        .map(|flags| xkb::keysym_from_name(name, flags).raw())
        .find(|raw| *raw != 0)
        .ok_or_else(|| ChordError::UnknownKey(name.to_string()))
}

/// Letters match regardless of case: providers report `Q` while Shift or
/// Caps Lock is held, chords are written `Alt+Shift+q`
fn canonical_keysym(raw: u32) -> u32 {
    let Some(c) = xkb::Keysym::new(raw).key_char().filter(|c| c.is_uppercase()) else {
        return raw;
    };
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => xkb::Keysym::from_char(l).raw(),
        _ => raw,
    }
}

/// Shell actions a chord can trigger
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Action {
    /// Run a command through `/bin/sh -c`
    Spawn { command: String },
    /// Ask the focused surface's client to close it
    Close,
    /// Raise the focused surface within its layer
    Raise,
    /// Focus the next window on the focused output
    CycleFocus,
    /// Send the focused surface to the next enabled output
    MoveToNextOutput,
    /// Move keyboard focus to the next enabled output
    FocusNextOutput,
    /// Stop the shell
    Quit,
}

/// A chord bound to an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keybinding {
    pub chord: KeyChord,
    pub action: Action,
}

impl Keybinding {
    pub fn new(chord: KeyChord, action: Action) -> Self {
        Self { chord, action }
    }
}

/// Immutable set of keybindings keyed by exact chord
#[derive(Debug, Clone, Default)]
pub struct KeybindingSet {
    bindings: HashMap<KeyChord, Action>,
}

impl KeybindingSet {
    /// Build a set; on duplicate chords the later binding wins
    pub fn new(bindings: impl IntoIterator<Item = Keybinding>) -> Self {
        let mut map = HashMap::new();
        for binding in bindings {
            if let Some(previous) = map.insert(binding.chord, binding.action) {
                warn!("Chord {} bound twice, dropping {:?}", binding.chord, previous);
            }
        }
        Self { bindings: map }
    }

    /// Exact match of a modifier set and trigger
    pub fn lookup(&self, modifiers: Modifiers, trigger: Trigger) -> Option<&Action> {
        let chord = match trigger {
            Trigger::Keysym(keysym) => KeyChord::key(modifiers, keysym),
            Trigger::Button(button) => KeyChord::button(modifiers, button),
        };
        self.bindings.get(&chord)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
