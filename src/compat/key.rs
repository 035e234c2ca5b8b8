use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of positions on the key wheel.
const WHEEL_SIZE: u8 = 12;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyParseError {
    #[error("empty key notation")]
    Empty,
    #[error("key number is not numeric: {0:?}")]
    NotNumeric(String),
    #[error("key number {0} outside 1-12")]
    OutOfRange(u32),
    #[error("key mode must be A or B, got {0:?}")]
    BadMode(String),
}

/// A = minor side of the wheel, B = major side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WheelMode {
    A,
    B,
}

/// A parsed wheel-notation key such as `8A`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WheelKey {
    pub number: u8,
    pub mode: WheelMode,
}

impl fmt::Display for WheelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            WheelMode::A => 'A',
            WheelMode::B => 'B',
        };
        write!(f, "{}{}", self.number, mode)
    }
}

impl WheelKey {
    /// Convert standard notation ("Am", "F#m", "Bb major", "C") to its wheel position.
    pub fn from_standard(raw: &str) -> Option<Self> {
        let cleaned = raw.trim().replace('\u{266F}', "#").replace('\u{266D}', "b");
        let lower = cleaned.to_ascii_lowercase();

        let (root, minor) = ["minor", "min", "m"]
            .iter()
            .find_map(|suffix| {
                lower
                    .strip_suffix(suffix)
                    .filter(|r| !r.trim().is_empty())
                    .map(|r| (r.trim().len(), true))
            })
            .or_else(|| {
                ["major", "maj"].iter().find_map(|suffix| {
                    lower
                        .strip_suffix(suffix)
                        .filter(|r| !r.trim().is_empty())
                        .map(|r| (r.trim().len(), false))
                })
            })
            .map(|(len, minor)| (cleaned[..len].to_string(), minor))
            .unwrap_or((cleaned.clone(), false));

        let pitch = pitch_class(&root)?;
        // C major sits at 8B, A minor at 8A; each fifth up moves one step clockwise.
        let (anchor, mode) = if minor { (9, WheelMode::A) } else { (0, WheelMode::B) };
        let fifths = ((pitch + 12 - anchor) * 7) % 12;
        let number = ((fifths + 7) % 12) as u8 + 1;
        Some(Self { number, mode })
    }
}

/// Pitch class (C = 0) of a note name with an optional single accidental.
fn pitch_class(root: &str) -> Option<u32> {
    let mut chars = root.trim().chars();
    let base = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let shift: i32 = match chars.next() {
        None => 0,
        Some('#') => 1,
        Some('b') | Some('B') => -1,
        Some(_) => return None,
    };
    if chars.next().is_some() {
        return None;
    }
    Some((base + 12 + shift) as u32 % 12)
}

/// Parse `<1-12><A|B>` wheel notation. Case-insensitive, surrounding whitespace ignored.
pub fn parse_wheel_key(raw: &str) -> Result<WheelKey, KeyParseError> {
    let trimmed = raw.trim().to_ascii_uppercase();
    if trimmed.is_empty() {
        return Err(KeyParseError::Empty);
    }
    let split = trimmed
        .char_indices()
        .last()
        .map(|(i, _)| i)
        .unwrap_or(0);
    let (number_str, mode_str) = trimmed.split_at(split);

    let mode = match mode_str {
        "A" => WheelMode::A,
        "B" => WheelMode::B,
        other => return Err(KeyParseError::BadMode(other.to_string())),
    };
    let number: u32 = number_str
        .parse()
        .map_err(|_| KeyParseError::NotNumeric(number_str.to_string()))?;
    if !(1..=WHEEL_SIZE as u32).contains(&number) {
        return Err(KeyParseError::OutOfRange(number));
    }

    Ok(WheelKey {
        number: number as u8,
        mode,
    })
}

/// Wrap-aware distance between two wheel positions: 12 and 1 are adjacent.
pub fn ring_distance(a: u8, b: u8) -> u8 {
    let d = a.abs_diff(b) % WHEEL_SIZE;
    d.min(WHEEL_SIZE - d)
}

/// Harmonic relation between two keys, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyRelation {
    Same,
    /// Same number, other mode (relative major/minor).
    Relative,
    /// One step around the wheel, same mode.
    Adjacent,
    /// One step around the wheel and a mode change.
    CrossModeAdjacent,
    /// Two steps around the wheel, same mode.
    EnergyBoost,
    Clash,
    /// At least one key could not be parsed.
    Unparseable,
    /// At least one key was not recorded.
    Missing,
}

impl KeyRelation {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Same => "same key",
            Self::Relative => "relative key",
            Self::Adjacent => "adjacent key",
            Self::CrossModeAdjacent => "cross-mode adjacent key",
            Self::EnergyBoost => "energy-boost key",
            Self::Clash => "key clash",
            Self::Unparseable => "unparseable key",
            Self::Missing => "unknown key",
        }
    }
}

impl fmt::Display for KeyRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// Relation between two parsed keys. Symmetric.
pub fn relation(a: WheelKey, b: WheelKey) -> KeyRelation {
    let distance = ring_distance(a.number, b.number);
    let same_mode = a.mode == b.mode;
    match (distance, same_mode) {
        (0, true) => KeyRelation::Same,
        (0, false) => KeyRelation::Relative,
        (1, true) => KeyRelation::Adjacent,
        (1, false) => KeyRelation::CrossModeAdjacent,
        (2, true) => KeyRelation::EnergyBoost,
        _ => KeyRelation::Clash,
    }
}

/// Resolve a raw key string: wheel notation first, standard notation as a fallback.
pub fn resolve_key(raw: &str) -> Result<WheelKey, KeyParseError> {
    parse_wheel_key(raw).or_else(|e| WheelKey::from_standard(raw).ok_or(e))
}

/// Classify two optional key strings. Missing or blank beats unparseable.
pub fn classify_keys(from: Option<&str>, to: Option<&str>) -> KeyRelation {
    let (Some(from), Some(to)) = (from, to) else {
        return KeyRelation::Missing;
    };
    if from.trim().is_empty() || to.trim().is_empty() {
        return KeyRelation::Missing;
    }
    match (resolve_key(from), resolve_key(to)) {
        (Ok(a), Ok(b)) => relation(a, b),
        (a, b) => {
            if let Err(e) = a.as_ref().and(b.as_ref()) {
                log::debug!("Unparseable key pair {from:?}/{to:?}: {e}");
            }
            KeyRelation::Unparseable
        }
    }
}
