//! Key signatures
//!
//! A key is a tonic spelling plus a mode. Its position on the circle of
//! fifths gives the accidental count (positive = sharps). Keys travel inside
//! segments as `keychange` events carrying the key name, e.g. "Eb major".

use std::fmt;
use std::str::FromStr;

use super::base_properties::KEY;
use super::errors::ModelError;
use super::event::{Event, Time};
use super::event_types::{KEY_CHANGE, KEY_SUB_ORDERING};
use super::property::Str;
use crate::transposition::pitch_transpose::{transpose_spelling, Spelling};

/// Circle-of-fifths position of each natural letter as a major tonic, C through B
const STEP_FIFTHS: [i32; 7] = [0, 2, 4, -1, 1, 3, 5];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    tonic: Spelling,
    minor: bool,
}

impl Default for Key {
    /// C major
    fn default() -> Self {
        Self {
            tonic: Spelling::new(0, 0),
            minor: false,
        }
    }
}

impl Key {
    pub fn new(tonic: Spelling, minor: bool) -> Self {
        Self { tonic, minor }
    }

    pub fn tonic(&self) -> Spelling {
        self.tonic
    }

    pub fn is_minor(&self) -> bool {
        self.minor
    }

    pub fn tonic_pitch_class(&self) -> i32 {
        self.tonic.pitch_class()
    }

    /// Sharps (positive) or flats (negative) in the signature
    pub fn accidental_count(&self) -> i32 {
        let fifths = STEP_FIFTHS[self.tonic.step as usize] + 7 * self.tonic.alter as i32;
        if self.minor {
            fifths - 3
        } else {
            fifths
        }
    }

    pub fn is_sharp(&self) -> bool {
        self.accidental_count() > 0
    }

    pub fn name(&self) -> String {
        format!("{} {}", self.tonic.name(), if self.minor { "minor" } else { "major" })
    }

    /// Move the tonic by (semitones, steps)
    ///
    /// A result needing more than seven sharps or flats, or a tonic beyond a
    /// double accidental, is respelled as the enharmonic tonic with the fewest
    /// accidentals (sharps on a tie), e.g. G# major becomes Ab major.
    pub fn transpose(&self, semitones: i32, steps: i32) -> Key {
        let tonic = transpose_spelling(self.tonic, semitones, steps);
        let key = Key::new(tonic, self.minor);
        if key.accidental_count().abs() <= 7 && tonic.alter.abs() <= 2 {
            return key;
        }

        (-3..=3)
            .map(|dstep| Key::new(transpose_spelling(tonic, 0, dstep), self.minor))
            .filter(|k| k.tonic.alter.abs() <= 2)
            .min_by_key(|k| (k.accidental_count().abs(), k.accidental_count() < 0))
            .unwrap_or(key)
    }

    /// Key carried by a key change event
    pub fn from_event(event: &Event) -> Result<Key, ModelError> {
        if !event.is_a(KEY_CHANGE) {
            return Err(ModelError::InvalidKey(format!(
                "event of type '{}' is not a key change",
                event.event_type()
            )));
        }
        let name = event.get::<Str>(&KEY)?;
        name.parse::<Key>().map_err(ModelError::InvalidKey)
    }

    /// Key change event for this key at `time`
    pub fn to_event(&self, time: Time) -> Event {
        Event::new(KEY_CHANGE, time, 0, KEY_SUB_ORDERING).with::<Str>(&KEY, self.name())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for Key {
    type Err = String;

    /// Parses "D major", "f# minor", "Bb" (major implied)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let tonic = parts
            .next()
            .and_then(Spelling::parse)
            .ok_or_else(|| format!("Invalid key: '{}'", s))?;

        let minor = match parts.next().map(|m| m.to_lowercase()) {
            None => false,
            Some(mode) if mode == "major" => false,
            Some(mode) if mode == "minor" => true,
            Some(_) => return Err(format!("Invalid key mode in '{}'. Expected major or minor", s)),
        };

        if parts.next().is_some() {
            return Err(format!("Invalid key: '{}'", s));
        }

        Ok(Key { tonic, minor })
    }
}
