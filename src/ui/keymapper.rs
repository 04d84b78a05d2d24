//! Key mapping for session input
//!
//! Converts host key events into the bytes handed to
//! `SessionRegistry::handle_input`. The sessions only understand newline,
//! carriage return and backspace, so the mapping is small:
//! Enter becomes CR LF, Ctrl+C is echoed as `^C` followed by a new line,
//! and printable characters are sent as UTF-8.

use bitflags::bitflags;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

bitflags! {
    /// Modifier keys
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
    }
}

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        if mods.contains(KeyModifiers::SHIFT) {
            result |= Modifiers::SHIFT;
        }
        if mods.contains(KeyModifiers::CONTROL) {
            result |= Modifiers::CTRL;
        }
        if mods.contains(KeyModifiers::ALT) {
            result |= Modifiers::ALT;
        }
        result
    }
}

/// Key mapper for converting key events to bytes
pub struct KeyMapper;

impl KeyMapper {
    /// Map a crossterm KeyEvent to session input, `None` if the key has no
    /// input representation
    pub fn map(event: &KeyEvent) -> Option<Vec<u8>> {
        let mods = Modifiers::from(event.modifiers);

        match event.code {
            KeyCode::Enter => Some(b"\r\n".to_vec()),
            KeyCode::Tab => Some(vec![b'\t']),
            KeyCode::Backspace => Some(vec![0x08]),
            KeyCode::Char(ch) => Self::map_char(ch, mods),
            _ => None,
        }
    }

    fn map_char(ch: char, mods: Modifiers) -> Option<Vec<u8>> {
        if mods.contains(Modifiers::CTRL) {
            return match ch.to_ascii_lowercase() {
                'c' => Some(b"^C\r\n".to_vec()),
                _ => None,
            };
        }

        let mut buf = [0u8; 4];
        Some(ch.encode_utf8(&mut buf).as_bytes().to_vec())
    }
}
