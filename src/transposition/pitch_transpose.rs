//! Diatonic-aware transposition of written pitches
//!
//! A transposition is a pair (semitones, steps): the sounding pitch moves by
//! `semitones` and the written letter moves by `steps`. Moving C by (3, 2)
//! gives Eb; moving it by (3, 1) gives D#. The accidental is whatever makes
//! the new letter sound at the new pitch.

use super::accidental::Accidental;

/// Pitch class of each natural letter, C through B
pub const NATURAL_PITCH_CLASSES: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];

/// Letter names, C through B
pub const STEP_NAMES: [char; 7] = ['C', 'D', 'E', 'F', 'G', 'A', 'B'];

/// Diatonic steps of the usual interval for each semitone count within an octave
/// (minor second = 1 step, tritone spelled as augmented fourth, ...)
const DEFAULT_STEPS: [i32; 12] = [0, 1, 1, 2, 2, 3, 3, 4, 5, 5, 6, 6];

/// A letter plus alteration, e.g. F# = step 3, alter +1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Spelling {
    /// 0 = C .. 6 = B
    pub step: u8,
    /// Semitones above (positive) or below (negative) the natural letter
    pub alter: i8,
}

impl Spelling {
    pub fn new(step: u8, alter: i8) -> Self {
        Self { step: step % 7, alter }
    }

    pub fn pitch_class(&self) -> i32 {
        (NATURAL_PITCH_CLASSES[self.step as usize] + self.alter as i32).rem_euclid(12)
    }

    /// Letter followed by `#`, `##`, `b` or `bb`
    pub fn name(&self) -> String {
        let mut name = STEP_NAMES[self.step as usize].to_string();
        let symbol = if self.alter > 0 { "#" } else { "b" };
        for _ in 0..self.alter.unsigned_abs() {
            name.push_str(symbol);
        }
        name
    }

    /// Parse names like "C", "f#", "Bb", "Gbb"
    pub fn parse(s: &str) -> Option<Spelling> {
        let mut chars = s.trim().chars();
        let letter = chars.next()?.to_ascii_uppercase();
        let step = STEP_NAMES.iter().position(|&c| c == letter)? as u8;
        let mut alter: i8 = 0;
        for c in chars {
            match c {
                '#' | '♯' => alter += 1,
                'b' | 'B' | '♭' => alter -= 1,
                _ => return None,
            }
        }
        if alter.abs() > 2 {
            return None;
        }
        Some(Spelling { step, alter })
    }
}

/// Usual diatonic step count for a chromatic interval (octaves included)
pub fn steps_for_semitones(semitones: i32) -> i32 {
    semitones.div_euclid(12) * 7 + DEFAULT_STEPS[semitones.rem_euclid(12) as usize]
}

/// Move a spelling by (semitones, steps). The result's alteration is
/// normalized into -6..=6 and may exceed what an accidental can show.
pub fn transpose_spelling(spelling: Spelling, semitones: i32, steps: i32) -> Spelling {
    let step = (spelling.step as i32 + steps).rem_euclid(7) as u8;
    let pitch_class = (spelling.pitch_class() + semitones).rem_euclid(12);

    let mut alter = pitch_class - NATURAL_PITCH_CLASSES[step as usize];
    if alter > 6 {
        alter -= 12;
    } else if alter < -6 {
        alter += 12;
    }

    Spelling { step, alter: alter as i8 }
}

/// Spelling of a MIDI pitch written with an explicit accidental
fn spell(pitch: i64, accidental: Accidental) -> Option<Spelling> {
    let natural = (pitch - accidental.alter() as i64).rem_euclid(12) as i32;
    let step = NATURAL_PITCH_CLASSES.iter().position(|&pc| pc == natural)?;
    Some(Spelling {
        step: step as u8,
        alter: accidental.alter(),
    })
}

/// Transpose a note's pitch and respell its accidental
///
/// Notes without an explicit accidental keep none: their spelling follows
/// whatever key is in force at the destination.
pub fn transpose_pitch(pitch: i64, accidental: Accidental, semitones: i32, steps: i32) -> (i64, Accidental) {
    let new_pitch = pitch + semitones as i64;

    if accidental == Accidental::NoAccidental {
        return (new_pitch, Accidental::NoAccidental);
    }

    let respelled = spell(pitch, accidental)
        .map(|s| transpose_spelling(s, semitones, steps))
        .and_then(|s| Accidental::from_alter(s.alter));

    (new_pitch, respelled.unwrap_or(Accidental::NoAccidental))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_steps() {
        assert_eq!(steps_for_semitones(0), 0);
        assert_eq!(steps_for_semitones(2), 1);
        assert_eq!(steps_for_semitones(7), 4);
        assert_eq!(steps_for_semitones(12), 7);
        assert_eq!(steps_for_semitones(-2), -1);
        assert_eq!(steps_for_semitones(-12), -7);
    }

    #[test]
    fn test_transpose_spelling_minor_third() {
        let c = Spelling::new(0, 0);
        assert_eq!(transpose_spelling(c, 3, 2).name(), "Eb");
        assert_eq!(transpose_spelling(c, 3, 1).name(), "D#");
    }

    #[test]
    fn test_transpose_spelling_wraps_octave() {
        let b = Spelling::new(6, 0);
        let cs = transpose_spelling(b, 2, 1);
        assert_eq!(cs.name(), "C#");
    }

    #[test]
    fn test_explicit_sharp_respelled() {
        // F#4 up a major second is G#4
        let (pitch, acc) = transpose_pitch(66, Accidental::Sharp, 2, 1);
        assert_eq!(pitch, 68);
        assert_eq!(acc, Accidental::Sharp);

        // F#4 up a minor second, written on G, is G natural
        let (pitch, acc) = transpose_pitch(66, Accidental::Sharp, 1, 1);
        assert_eq!(pitch, 67);
        assert_eq!(acc, Accidental::Natural);
    }

    #[test]
    fn test_implied_accidental_stays_implied() {
        assert_eq!(transpose_pitch(61, Accidental::NoAccidental, -3, -2), (58, Accidental::NoAccidental));
    }

    #[test]
    fn test_unrepresentable_spelling_drops_accidental() {
        // Bb written up a semitone on the same letter would need B natural: fine.
        assert_eq!(transpose_pitch(70, Accidental::Flat, 1, 0), (71, Accidental::Natural));
        // Bbb up four semitones kept on B would need a triple sharp
        assert_eq!(transpose_pitch(69, Accidental::DoubleFlat, 5, 0).1, Accidental::NoAccidental);
    }

    #[test]
    fn test_parse_spelling() {
        assert_eq!(Spelling::parse("f#"), Some(Spelling::new(3, 1)));
        assert_eq!(Spelling::parse("Bb"), Some(Spelling::new(6, -1)));
        assert_eq!(Spelling::parse("H"), None);
        assert_eq!(Spelling::parse("C###"), None);
    }
}
