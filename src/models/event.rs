//! Event: the timed, typed, property-bearing unit of musical data
//!
//! An event is a value type. Its persistent half (type, times, sub-ordering
//! and persistent properties) sits behind an `Arc` and is shared by every
//! copy made from a common ancestor; any mutation clones the block first
//! when it is shared. The non-persistent half is owned by one instance and
//! starts out empty on every copy.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

use super::base_properties::{NOTATION_DURATION, NOTATION_TIME};
use super::errors::PropertyError;
use super::property::{Int, PropertyKind, PropertyMap, PropertyName, PropertyType, PropertyValue};

/// Musical time in ticks
pub type Time = i64;

/// Sorts before any sub-ordering a real event can carry
pub const MIN_SUBORDERING: i16 = i16::MIN;

/// Event times never go below zero
fn clamped_time(time: Time) -> Time {
    if time < 0 {
        log::warn!("Negative event time {} clamped to 0", time);
        return 0;
    }
    time
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct EventData {
    #[serde(rename = "type")]
    event_type: String,
    absolute_time: Time,
    duration: Time,
    #[serde(default)]
    sub_ordering: i16,
    #[serde(default)]
    properties: PropertyMap,
}

#[derive(Debug)]
pub struct Event {
    data: Arc<EventData>,
    non_persistent: PropertyMap,
}

impl Clone for Event {
    /// Shares the persistent block; the copy gets no non-persistent properties.
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            non_persistent: PropertyMap::default(),
        }
    }
}

impl PartialEq for Event {
    /// Compares persistent state only.
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data) || self.data == other.data
    }
}

impl Event {
    pub fn new<T: Into<String>>(event_type: T, absolute_time: Time, duration: Time, sub_ordering: i16) -> Self {
        Self {
            data: Arc::new(EventData {
                event_type: event_type.into(),
                absolute_time: clamped_time(absolute_time),
                duration,
                sub_ordering,
                properties: PropertyMap::default(),
            }),
            non_persistent: PropertyMap::default(),
        }
    }

    /// Copy of this event at a new time and duration, with an independent data block.
    /// Notation time and duration follow the new performance values.
    pub fn retimed(&self, absolute_time: Time, duration: Time) -> Event {
        self.retimed_with(absolute_time, duration, self.sub_ordering(), absolute_time, duration)
    }

    /// Copy of this event with every timing attribute replaced
    pub fn retimed_with(
        &self,
        absolute_time: Time,
        duration: Time,
        sub_ordering: i16,
        notation_absolute_time: Time,
        notation_duration: Time,
    ) -> Event {
        let mut event = self.clone();
        {
            let data = event.unshare();
            data.absolute_time = clamped_time(absolute_time);
            data.duration = duration;
            data.sub_ordering = sub_ordering;
        }
        event.set_notation_absolute_time(notation_absolute_time.max(0));
        event.set_notation_duration(notation_duration);
        event
    }

    /// Copy moved by `delta` ticks, keeping its notation offset
    pub fn shifted(&self, delta: Time) -> Event {
        self.retimed_with(
            self.absolute_time() + delta,
            self.duration(),
            self.sub_ordering(),
            self.notation_absolute_time() + delta,
            self.notation_duration(),
        )
    }

    /// Builder-style persistent property assignment for freshly made events.
    /// Replaces any existing cell of that name regardless of its kind.
    pub fn with<K: PropertyKind>(mut self, name: &PropertyName, value: K::Value) -> Self {
        self.non_persistent.remove(name);
        self.unshare().properties.insert(name.clone(), K::wrap(value));
        self
    }

    /// Give this instance its own data block if it is shared
    fn unshare(&mut self) -> &mut EventData {
        Arc::make_mut(&mut self.data)
    }

    /// Whether both events still point at the same persistent block
    pub fn is_sharing_data_with(&self, other: &Event) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    pub fn event_type(&self) -> &str {
        &self.data.event_type
    }

    pub fn is_a(&self, event_type: &str) -> bool {
        self.data.event_type == event_type
    }

    pub fn set_event_type<T: Into<String>>(&mut self, event_type: T) {
        self.unshare().event_type = event_type.into();
    }

    pub fn absolute_time(&self) -> Time {
        self.data.absolute_time
    }

    pub fn duration(&self) -> Time {
        self.data.duration
    }

    pub fn sub_ordering(&self) -> i16 {
        self.data.sub_ordering
    }

    // No setters for time, duration or sub-ordering: they fix an event's
    // place in a segment. Use `retimed` or `shifted` for a moved copy.

    pub fn notation_absolute_time(&self) -> Time {
        self.stored_time(&NOTATION_TIME).unwrap_or(self.data.absolute_time)
    }

    pub fn notation_duration(&self) -> Time {
        self.stored_time(&NOTATION_DURATION).unwrap_or(self.data.duration)
    }

    /// Stored only when it differs from the performance time
    pub fn set_notation_absolute_time(&mut self, time: Time) {
        let default = self.data.absolute_time;
        self.set_time_property(NOTATION_TIME, time, default);
    }

    /// Stored only when it differs from the performance duration
    pub fn set_notation_duration(&mut self, duration: Time) {
        let default = self.data.duration;
        self.set_time_property(NOTATION_DURATION, duration, default);
    }

    /// Latest end of either the performance or the notation extent
    pub fn greatest_time(&self) -> Time {
        let performed = self.absolute_time() + self.duration();
        let notated = self.notation_absolute_time() + self.notation_duration();
        performed.max(notated)
    }

    fn stored_time(&self, name: &PropertyName) -> Option<Time> {
        self.data.properties.get(name).and_then(|v| Int::unwrap(v)).copied()
    }

    fn set_time_property(&mut self, name: PropertyName, value: Time, default: Time) {
        if value == default {
            if self.data.properties.contains(&name) {
                self.unshare().properties.remove(&name);
            }
        } else {
            self.unshare().properties.insert(name, Int::wrap(value));
        }
    }

    fn find(&self, name: &PropertyName) -> Option<(&PropertyValue, bool)> {
        if let Some(value) = self.data.properties.get(name) {
            return Some((value, true));
        }
        self.non_persistent.get(name).map(|value| (value, false))
    }

    pub fn has(&self, name: &PropertyName) -> bool {
        self.find(name).is_some()
    }

    /// Read a property of kind `K`
    pub fn get<K: PropertyKind>(&self, name: &PropertyName) -> Result<K::Value, PropertyError> {
        let (value, _) = self
            .find(name)
            .ok_or_else(|| PropertyError::NoData { name: name.clone() })?;
        K::unwrap(value).cloned().ok_or_else(|| PropertyError::BadType {
            name: name.clone(),
            expected: K::TYPE,
            actual: value.property_type(),
        })
    }

    /// Non-failing probe; leaves `out` untouched and returns false if the
    /// property is absent or of another kind
    pub fn get_into<K: PropertyKind>(&self, name: &PropertyName, out: &mut K::Value) -> bool {
        match self.find(name).and_then(|(value, _)| K::unwrap(value)) {
            Some(value) => {
                *out = value.clone();
                true
            }
            None => false,
        }
    }

    /// Set a persistent property
    pub fn set<K: PropertyKind>(&mut self, name: &PropertyName, value: K::Value) -> Result<(), PropertyError> {
        self.set_with_persistence::<K>(name, value, true)
    }

    /// Set a property in the requested persistence class, moving an existing
    /// cell out of the other class
    pub fn set_with_persistence<K: PropertyKind>(
        &mut self,
        name: &PropertyName,
        value: K::Value,
        persistent: bool,
    ) -> Result<(), PropertyError> {
        if let Some((existing, _)) = self.find(name) {
            check_kind::<K>(name, existing.property_type())?;
        }

        if persistent {
            self.non_persistent.remove(name);
            self.unshare().properties.insert(name.clone(), K::wrap(value));
        } else {
            if self.data.properties.contains(name) {
                self.unshare().properties.remove(name);
            }
            self.non_persistent.insert(name.clone(), K::wrap(value));
        }
        Ok(())
    }

    /// Supply a non-persistent value unless a persistent one is already set
    pub fn set_maybe<K: PropertyKind>(&mut self, name: &PropertyName, value: K::Value) -> Result<(), PropertyError> {
        if self.data.properties.contains(name) {
            return Ok(());
        }
        if let Some(existing) = self.non_persistent.get(name) {
            check_kind::<K>(name, existing.property_type())?;
        }
        self.non_persistent.insert(name.clone(), K::wrap(value));
        Ok(())
    }

    pub fn unset(&mut self, name: &PropertyName) {
        if self.data.properties.contains(name) {
            self.unshare().properties.remove(name);
        }
        self.non_persistent.remove(name);
    }

    /// `None` if the property is absent
    pub fn is_persistent(&self, name: &PropertyName) -> Option<bool> {
        self.find(name).map(|(_, persistent)| persistent)
    }

    /// Move an existing property between the persistent and non-persistent tables
    pub fn set_persistence(&mut self, name: &PropertyName, persistent: bool) -> Result<(), PropertyError> {
        match self.is_persistent(name) {
            None => Err(PropertyError::NoData { name: name.clone() }),
            Some(current) if current == persistent => Ok(()),
            Some(true) => {
                if let Some(value) = self.unshare().properties.remove(name) {
                    self.non_persistent.insert(name.clone(), value);
                }
                Ok(())
            }
            Some(false) => {
                if let Some(value) = self.non_persistent.remove(name) {
                    self.unshare().properties.insert(name.clone(), value);
                }
                Ok(())
            }
        }
    }

    pub fn property_type(&self, name: &PropertyName) -> Result<PropertyType, PropertyError> {
        self.find(name)
            .map(|(value, _)| value.property_type())
            .ok_or_else(|| PropertyError::NoData { name: name.clone() })
    }

    pub fn property_type_name(&self, name: &PropertyName) -> Result<&'static str, PropertyError> {
        self.property_type(name).map(|t| t.name())
    }

    /// Display form of a property of any kind
    pub fn get_as_string(&self, name: &PropertyName) -> Result<String, PropertyError> {
        self.find(name)
            .map(|(value, _)| value.to_string())
            .ok_or_else(|| PropertyError::NoData { name: name.clone() })
    }

    pub fn persistent_property_names(&self) -> Vec<PropertyName> {
        self.data.properties.names().cloned().collect()
    }

    pub fn non_persistent_property_names(&self) -> Vec<PropertyName> {
        self.non_persistent.names().cloned().collect()
    }

    pub fn persistent_properties(&self) -> &PropertyMap {
        &self.data.properties
    }

    pub fn clear_non_persistent_properties(&mut self) {
        self.non_persistent.clear();
    }
}

fn check_kind<K: PropertyKind>(name: &PropertyName, actual: PropertyType) -> Result<(), PropertyError> {
    if actual == K::TYPE {
        Ok(())
    } else {
        Err(PropertyError::BadType {
            name: name.clone(),
            expected: K::TYPE,
            actual,
        })
    }
}

// Only the persistent half is serialized; unknown property names pass
// through untouched.

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.data.as_ref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        EventData::deserialize(deserializer).map(|data| Event {
            data: Arc::new(data),
            non_persistent: PropertyMap::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::base_properties::{ACCIDENTAL, PITCH, VELOCITY};
    use crate::models::property::{Bool, Str};

    fn note(time: Time) -> Event {
        Event::new("note", time, 240, 0).with::<Int>(&PITCH, 60)
    }

    #[test]
    fn test_set_then_get() {
        let mut e = note(0);
        e.set::<Int>(&VELOCITY, 100).unwrap();
        assert_eq!(e.get::<Int>(&VELOCITY).unwrap(), 100);
        assert!(e.has(&VELOCITY));
    }

    #[test]
    fn test_missing_and_mismatched_are_distinct() {
        let e = note(0);
        assert!(matches!(e.get::<Int>(&VELOCITY), Err(PropertyError::NoData { .. })));
        match e.get::<Str>(&PITCH) {
            Err(PropertyError::BadType { expected, actual, .. }) => {
                assert_eq!(expected, PropertyType::String);
                assert_eq!(actual, PropertyType::Int);
            }
            other => panic!("expected BadType, got {:?}", other),
        }
    }

    #[test]
    fn test_set_rejects_other_kind() {
        let mut e = note(0);
        let err = e.set::<Bool>(&PITCH, true).unwrap_err();
        assert!(matches!(err, PropertyError::BadType { .. }));
        assert_eq!(e.get::<Int>(&PITCH).unwrap(), 60);
    }

    #[test]
    fn test_clone_shares_until_mutation() {
        let e1 = note(0);
        let mut e2 = e1.clone();
        assert!(e1.is_sharing_data_with(&e2));

        e2.set::<Int>(&PITCH, 62).unwrap();
        assert!(!e1.is_sharing_data_with(&e2));
        assert_eq!(e1.get::<Int>(&PITCH).unwrap(), 60);
        assert_eq!(e2.get::<Int>(&PITCH).unwrap(), 62);
    }

    #[test]
    fn test_non_persistent_not_copied() {
        let mut e1 = note(0);
        e1.set_with_persistence::<Str>(&ACCIDENTAL, "sharp".to_string(), false).unwrap();
        let e2 = e1.clone();
        assert!(e1.has(&ACCIDENTAL));
        assert!(!e2.has(&ACCIDENTAL));
        assert!(e1.is_sharing_data_with(&e2));
    }

    #[test]
    fn test_set_moves_between_persistence_classes() {
        let mut e = note(0);
        e.set_with_persistence::<Int>(&PITCH, 61, false).unwrap();
        assert_eq!(e.is_persistent(&PITCH), Some(false));
        assert!(e.persistent_property_names().is_empty());
        assert_eq!(e.non_persistent_property_names(), vec![PITCH]);

        e.set::<Int>(&PITCH, 62).unwrap();
        assert_eq!(e.is_persistent(&PITCH), Some(true));
        assert!(e.non_persistent_property_names().is_empty());
    }

    #[test]
    fn test_set_maybe_respects_persistent_cells() {
        let mut e = note(0);
        e.set_maybe::<Int>(&PITCH, 70).unwrap();
        assert_eq!(e.get::<Int>(&PITCH).unwrap(), 60);

        e.set_maybe::<Int>(&VELOCITY, 90).unwrap();
        e.set_maybe::<Int>(&VELOCITY, 91).unwrap();
        assert_eq!(e.get::<Int>(&VELOCITY).unwrap(), 91);
        assert_eq!(e.is_persistent(&VELOCITY), Some(false));
    }

    #[test]
    fn test_notation_times_default_to_performance() {
        let mut e = note(480);
        assert_eq!(e.notation_absolute_time(), 480);
        assert_eq!(e.notation_duration(), 240);

        e.set_notation_absolute_time(470);
        assert_eq!(e.notation_absolute_time(), 470);
        assert!(e.has(&NOTATION_TIME));

        e.set_notation_absolute_time(480);
        assert!(!e.has(&NOTATION_TIME));
    }

    #[test]
    fn test_retimed_is_independent() {
        let e1 = note(0);
        let e2 = e1.retimed(960, 120);
        assert!(!e1.is_sharing_data_with(&e2));
        assert_eq!(e2.absolute_time(), 960);
        assert_eq!(e2.duration(), 120);
        assert_eq!(e2.get::<Int>(&PITCH).unwrap(), 60);
        assert_eq!(e1.absolute_time(), 0);
    }

    #[test]
    fn test_shifted_keeps_notation_offset() {
        let mut e = note(100);
        e.set_notation_absolute_time(96);
        let moved = e.shifted(1000);
        assert_eq!(moved.absolute_time(), 1100);
        assert_eq!(moved.notation_absolute_time(), 1096);
    }

    #[test]
    fn test_negative_times_clamp_to_zero() {
        assert_eq!(Event::new("note", -5, 240, 0).absolute_time(), 0);

        let moved = note(100).shifted(-200);
        assert_eq!(moved.absolute_time(), 0);
        assert_eq!(moved.notation_absolute_time(), 0);
        assert_eq!(moved.duration(), 240);
    }

    #[test]
    fn test_get_as_string_and_type_name() {
        let e = note(0).with::<Bool>(&PropertyName::from_static("stemup"), true);
        assert_eq!(e.get_as_string(&PITCH).unwrap(), "60");
        assert_eq!(e.property_type_name(&PropertyName::from_static("stemup")).unwrap(), "Bool");
    }

    #[test]
    fn test_set_persistence_moves_cell() {
        let mut e = note(0);
        e.set_persistence(&PITCH, false).unwrap();
        assert_eq!(e.is_persistent(&PITCH), Some(false));
        assert!(e.set_persistence(&VELOCITY, true).is_err());
    }

    #[test]
    fn test_unset_is_noop_when_absent() {
        let mut e = note(0);
        let copy = e.clone();
        e.unset(&VELOCITY);
        assert!(e.is_sharing_data_with(&copy));
        e.unset(&PITCH);
        assert!(!e.has(&PITCH));
        assert!(copy.has(&PITCH));
    }
}
