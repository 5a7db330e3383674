//! Notation-aware insertion helpers
//!
//! A segment holds at most one live key change per time. Inserting a key
//! replaces whatever key change already sits at that time, unless that event
//! is marked to be left alone by link updates.

use super::{EventKey, Segment};
use crate::linker::ignores_link_updates;
use crate::models::event_types::is_key_change;
use crate::models::{Event, Key, Time};

pub fn insert_key(segment: &mut Segment, time: Time, key: &Key) -> EventKey {
    insert_key_event(segment, key.to_event(time))
}

/// Insert a prepared key change event, replacing existing key changes at its time.
/// Properties on the event, such as invisibility, are kept.
pub fn insert_key_event(segment: &mut Segment, event: Event) -> EventKey {
    let time = event.absolute_time();
    let replaced: Vec<EventKey> = segment
        .time_slice(time)
        .filter(|(_, existing)| is_key_change(existing) && !ignores_link_updates(existing))
        .map(|(key, _)| key)
        .collect();
    for key in replaced {
        segment.erase(key);
    }
    segment.insert(event)
}

/// Key in force at `time`: the last parseable key change at or before it, or C major
pub fn key_at(segment: &Segment, time: Time) -> Key {
    segment
        .range(Time::MIN, time + 1)
        .rev()
        .filter(|(_, event)| is_key_change(event))
        .find_map(|(_, event)| Key::from_event(event).ok())
        .unwrap_or_default()
}
