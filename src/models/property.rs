//! Typed property cells and property tables
//!
//! Events carry an open set of named attributes (pitch, velocity, tie flags,
//! lyric text, ...). Each attribute lives in a [`PropertyValue`] cell whose
//! kind comes from a closed set. Accessors are parameterized by a kind marker
//! ([`Int`], [`Bool`], [`Str`], [`RealTimeT`]) so that a mismatch is detected
//! where the property is read instead of being silently coerced.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// Name of an event property
///
/// Well-known names are `const` and borrow a static string; names read
/// back from a document are owned.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyName(Cow<'static, str>);

impl PropertyName {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new<T: Into<String>>(name: T) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PropertyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for PropertyName {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for PropertyName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Wall-clock time value, used for audio-aligned properties
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RealTime {
    pub sec: i32,
    pub nsec: i32,
}

impl RealTime {
    pub const ZERO: RealTime = RealTime { sec: 0, nsec: 0 };

    pub fn new(sec: i32, nsec: i32) -> Self {
        Self { sec, nsec }
    }

    pub fn from_millis(millis: i64) -> Self {
        Self {
            sec: millis.div_euclid(1000) as i32,
            nsec: (millis.rem_euclid(1000) * 1_000_000) as i32,
        }
    }
}

impl fmt::Display for RealTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nsec)
    }
}

/// Kind tag of a property cell
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    Int,
    Bool,
    String,
    RealTime,
}

impl PropertyType {
    /// Name used in diagnostics and type-mismatch errors
    pub fn name(&self) -> &'static str {
        match self {
            PropertyType::Int => "Int",
            PropertyType::Bool => "Bool",
            PropertyType::String => "String",
            PropertyType::RealTime => "RealTimeT",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single typed value cell
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Int(i64),
    Bool(bool),
    String(String),
    RealTime(RealTime),
}

impl PropertyValue {
    pub fn property_type(&self) -> PropertyType {
        match self {
            PropertyValue::Int(_) => PropertyType::Int,
            PropertyValue::Bool(_) => PropertyType::Bool,
            PropertyValue::String(_) => PropertyType::String,
            PropertyValue::RealTime(_) => PropertyType::RealTime,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::Bool(v) => f.write_str(if *v { "true" } else { "false" }),
            PropertyValue::String(v) => f.write_str(v),
            PropertyValue::RealTime(v) => write!(f, "{}", v),
        }
    }
}

/// Compile-time selector for one property kind
///
/// The markers are uninhabited; they only exist to pick the value type in
/// calls such as `event.get::<Int>(&PITCH)`.
pub trait PropertyKind {
    type Value: Clone + PartialEq + fmt::Debug;

    const TYPE: PropertyType;

    fn wrap(value: Self::Value) -> PropertyValue;

    fn unwrap(value: &PropertyValue) -> Option<&Self::Value>;
}

#[derive(Debug)]
pub enum Int {}

#[derive(Debug)]
pub enum Bool {}

#[derive(Debug)]
pub enum Str {}

#[derive(Debug)]
pub enum RealTimeT {}

impl PropertyKind for Int {
    type Value = i64;
    const TYPE: PropertyType = PropertyType::Int;

    fn wrap(value: i64) -> PropertyValue {
        PropertyValue::Int(value)
    }

    fn unwrap(value: &PropertyValue) -> Option<&i64> {
        match value {
            PropertyValue::Int(v) => Some(v),
            _ => None,
        }
    }
}

impl PropertyKind for Bool {
    type Value = bool;
    const TYPE: PropertyType = PropertyType::Bool;

    fn wrap(value: bool) -> PropertyValue {
        PropertyValue::Bool(value)
    }

    fn unwrap(value: &PropertyValue) -> Option<&bool> {
        match value {
            PropertyValue::Bool(v) => Some(v),
            _ => None,
        }
    }
}

impl PropertyKind for Str {
    type Value = String;
    const TYPE: PropertyType = PropertyType::String;

    fn wrap(value: String) -> PropertyValue {
        PropertyValue::String(value)
    }

    fn unwrap(value: &PropertyValue) -> Option<&String> {
        match value {
            PropertyValue::String(v) => Some(v),
            _ => None,
        }
    }
}

impl PropertyKind for RealTimeT {
    type Value = RealTime;
    const TYPE: PropertyType = PropertyType::RealTime;

    fn wrap(value: RealTime) -> PropertyValue {
        PropertyValue::RealTime(value)
    }

    fn unwrap(value: &PropertyValue) -> Option<&RealTime> {
        match value {
            PropertyValue::RealTime(v) => Some(v),
            _ => None,
        }
    }
}

/// Name to value-cell mapping; a name appears at most once
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyMap(BTreeMap<PropertyName, PropertyValue>);

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &PropertyName) -> Option<&PropertyValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &PropertyName) -> bool {
        self.0.contains_key(name)
    }

    /// Insert or replace a cell, returning the previous one
    pub fn insert(&mut self, name: PropertyName, value: PropertyValue) -> Option<PropertyValue> {
        self.0.insert(name, value)
    }

    pub fn remove(&mut self, name: &PropertyName) -> Option<PropertyValue> {
        self.0.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &PropertyName> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PropertyName, &PropertyValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_markers_unwrap_only_their_kind() {
        let value = Int::wrap(60);
        assert_eq!(Int::unwrap(&value), Some(&60));
        assert_eq!(Str::unwrap(&value), None);
        assert_eq!(value.property_type(), PropertyType::Int);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(PropertyType::Int.name(), "Int");
        assert_eq!(PropertyType::RealTime.to_string(), "RealTimeT");
    }

    #[test]
    fn test_static_and_owned_names_compare_equal() {
        const PITCH: PropertyName = PropertyName::from_static("pitch");
        let owned = PropertyName::new(String::from("pitch"));
        assert_eq!(PITCH, owned);

        let mut map = PropertyMap::new();
        map.insert(owned, PropertyValue::Int(64));
        assert!(map.contains(&PITCH));
    }

    #[test]
    fn test_realtime_display() {
        assert_eq!(RealTime::from_millis(1500).to_string(), "1.500000000");
        assert_eq!(RealTime::from_millis(-1), RealTime::new(-1, 999_000_000));
    }
}
