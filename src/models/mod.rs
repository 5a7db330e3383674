//! Models module for the musical data model
//!
//! This module contains the event representation and the property system
//! it is built on, plus the musical value types stored in events.

pub mod base_properties;
pub mod errors;
pub mod event;
pub mod event_types;
pub mod key;
pub mod property;

// Re-export commonly used types
pub use errors::{ModelError, PropertyError};
pub use event::{Event, Time, MIN_SUBORDERING};
pub use key::Key;
pub use property::{Bool, Int, PropertyKind, PropertyMap, PropertyName, PropertyType, PropertyValue, RealTime, RealTimeT, Str};
