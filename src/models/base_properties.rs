//! Well-known property names
//!
//! Events may carry any property name; these are the ones the model itself
//! reads or writes.

use super::property::PropertyName;

/// MIDI pitch of a note (Int)
pub const PITCH: PropertyName = PropertyName::from_static("pitch");

/// Note-on velocity (Int)
pub const VELOCITY: PropertyName = PropertyName::from_static("velocity");

/// Displayed accidental of a note (String, see `transposition::Accidental`)
pub const ACCIDENTAL: PropertyName = PropertyName::from_static("accidental");

pub const TIED_FORWARD: PropertyName = PropertyName::from_static("tiedforward");
pub const TIED_BACKWARD: PropertyName = PropertyName::from_static("tiedbackward");
pub const BEAMED_GROUP_ID: PropertyName = PropertyName::from_static("groupid");

/// Event is kept for its musical effect but not drawn (Bool)
pub const INVISIBLE: PropertyName = PropertyName::from_static("invisible");

/// Event is neither erased nor copied when linked segments are synchronized (Bool)
pub const LINKED_SEGMENT_IGNORE_UPDATE: PropertyName =
    PropertyName::from_static("linkedsegmentignoreupdate");

/// Key signature name on a key change, e.g. "D major" (String)
pub const KEY: PropertyName = PropertyName::from_static("key");

/// Clef name on a clef change (String)
pub const CLEF: PropertyName = PropertyName::from_static("clef");

/// Text body of a text event (String)
pub const TEXT: PropertyName = PropertyName::from_static("text");

/// Kind of text event, e.g. "lyric" (String)
pub const TEXT_TYPE: PropertyName = PropertyName::from_static("type");

/// Zero-based lyric verse (Int)
pub const VERSE: PropertyName = PropertyName::from_static("verse");

pub const CONTROLLER_NUMBER: PropertyName = PropertyName::from_static("number");
pub const CONTROLLER_VALUE: PropertyName = PropertyName::from_static("value");

/// Rendering time when it differs from the performance time (Int)
pub const NOTATION_TIME: PropertyName = PropertyName::from_static("notationtime");

/// Rendering duration when it differs from the performance duration (Int)
pub const NOTATION_DURATION: PropertyName = PropertyName::from_static("notationduration");
