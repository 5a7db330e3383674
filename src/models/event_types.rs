//! Event type tags, their sub-orderings, and constructors for the common kinds
//!
//! Events sharing an absolute time are ordered by sub-ordering: clefs and keys
//! come first so that notes at the same time are read in the right context,
//! rests come after notes.

use super::base_properties::{CLEF, CONTROLLER_NUMBER, CONTROLLER_VALUE, PITCH, TEXT, TEXT_TYPE, VELOCITY, VERSE};
use super::event::{Event, Time};
use super::property::{Int, Str};

pub const NOTE: &str = "note";
pub const NOTE_SUB_ORDERING: i16 = 0;

pub const REST: &str = "rest";
pub const REST_SUB_ORDERING: i16 = 10;

pub const CLEF_CHANGE: &str = "clefchange";
pub const CLEF_SUB_ORDERING: i16 = -250;

pub const KEY_CHANGE: &str = "keychange";
pub const KEY_SUB_ORDERING: i16 = -200;

pub const TEXT_EVENT: &str = "text";
pub const TEXT_SUB_ORDERING: i16 = -70;

pub const CONTROLLER: &str = "controller";
pub const CONTROLLER_SUB_ORDERING: i16 = -5;

/// Text type of lyric syllables
pub const LYRIC: &str = "lyric";

/// Text type used when none is given
pub const UNSPECIFIED_TEXT: &str = "unspecified";

pub const DEFAULT_VELOCITY: i64 = 100;

pub fn note(time: Time, duration: Time, pitch: i64) -> Event {
    note_with_velocity(time, duration, pitch, DEFAULT_VELOCITY)
}

pub fn note_with_velocity(time: Time, duration: Time, pitch: i64, velocity: i64) -> Event {
    Event::new(NOTE, time, duration, NOTE_SUB_ORDERING)
        .with::<Int>(&PITCH, pitch)
        .with::<Int>(&VELOCITY, velocity)
}

pub fn rest(time: Time, duration: Time) -> Event {
    Event::new(REST, time, duration, REST_SUB_ORDERING)
}

pub fn clef(time: Time, name: &str) -> Event {
    Event::new(CLEF_CHANGE, time, 0, CLEF_SUB_ORDERING).with::<Str>(&CLEF, name.to_string())
}

pub fn text(time: Time, body: &str, text_type: &str) -> Event {
    Event::new(TEXT_EVENT, time, 0, TEXT_SUB_ORDERING)
        .with::<Str>(&TEXT, body.to_string())
        .with::<Str>(&TEXT_TYPE, text_type.to_string())
}

/// Lyric syllable for the given zero-based verse
pub fn lyric(time: Time, syllable: &str, verse: i64) -> Event {
    text(time, syllable, LYRIC).with::<Int>(&VERSE, verse)
}

pub fn controller(time: Time, number: i64, value: i64) -> Event {
    Event::new(CONTROLLER, time, 0, CONTROLLER_SUB_ORDERING)
        .with::<Int>(&CONTROLLER_NUMBER, number)
        .with::<Int>(&CONTROLLER_VALUE, value)
}

pub fn is_note(event: &Event) -> bool {
    event.is_a(NOTE)
}

pub fn is_rest(event: &Event) -> bool {
    event.is_a(REST)
}

pub fn is_key_change(event: &Event) -> bool {
    event.is_a(KEY_CHANGE)
}

pub fn is_lyric(event: &Event) -> bool {
    event.is_a(TEXT_EVENT) && matches!(event.get::<Str>(&TEXT_TYPE).as_deref(), Ok(LYRIC))
}
