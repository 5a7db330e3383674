//! Displayed accidental of a note
//!
//! `NoAccidental` means the accidental is implied by the key in force; the
//! other variants are explicit and are respelled when a note is transposed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Accidental {
    #[serde(rename = "no-accidental")]
    NoAccidental,
    #[serde(rename = "natural")]
    Natural,
    #[serde(rename = "sharp")]
    Sharp,
    #[serde(rename = "flat")]
    Flat,
    #[serde(rename = "double-sharp")]
    DoubleSharp,
    #[serde(rename = "double-flat")]
    DoubleFlat,
}

impl Accidental {
    pub fn as_str(&self) -> &'static str {
        match self {
            Accidental::NoAccidental => "no-accidental",
            Accidental::Natural => "natural",
            Accidental::Sharp => "sharp",
            Accidental::Flat => "flat",
            Accidental::DoubleSharp => "double-sharp",
            Accidental::DoubleFlat => "double-flat",
        }
    }

    /// Semitone alteration of the written letter
    pub fn alter(&self) -> i8 {
        match self {
            Accidental::NoAccidental | Accidental::Natural => 0,
            Accidental::Sharp => 1,
            Accidental::Flat => -1,
            Accidental::DoubleSharp => 2,
            Accidental::DoubleFlat => -2,
        }
    }

    /// Explicit accidental for an alteration; `None` outside double flat..double sharp
    pub fn from_alter(alter: i8) -> Option<Accidental> {
        match alter {
            -2 => Some(Accidental::DoubleFlat),
            -1 => Some(Accidental::Flat),
            0 => Some(Accidental::Natural),
            1 => Some(Accidental::Sharp),
            2 => Some(Accidental::DoubleSharp),
            _ => None,
        }
    }
}

impl Default for Accidental {
    fn default() -> Self {
        Accidental::NoAccidental
    }
}

impl fmt::Display for Accidental {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Accidental {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no-accidental" | "" => Ok(Accidental::NoAccidental),
            "natural" => Ok(Accidental::Natural),
            "sharp" => Ok(Accidental::Sharp),
            "flat" => Ok(Accidental::Flat),
            "double-sharp" => Ok(Accidental::DoubleSharp),
            "double-flat" => Ok(Accidental::DoubleFlat),
            _ => Err(format!("Invalid accidental: '{}'", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_round_trips_names() {
        for acc in [
            Accidental::NoAccidental,
            Accidental::Natural,
            Accidental::Sharp,
            Accidental::Flat,
            Accidental::DoubleSharp,
            Accidental::DoubleFlat,
        ] {
            assert_eq!(acc.as_str().parse::<Accidental>().unwrap(), acc);
        }
        assert!("quarter-sharp".parse::<Accidental>().is_err());
    }

    #[test]
    fn test_from_alter_bounds() {
        assert_eq!(Accidental::from_alter(-2), Some(Accidental::DoubleFlat));
        assert_eq!(Accidental::from_alter(3), None);
    }
}
