//! Error types for the data model
//!
//! Property accessors report missing data and kind mismatches as distinct
//! variants. Composition and linker operations wrap those and add their own
//! membership failures.

use thiserror::Error;

use super::property::{PropertyName, PropertyType};
use crate::linker::LinkerId;
use crate::segment::SegmentId;

/// Failure of a typed property access
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropertyError {
    /// The property is not present on the event
    #[error("No data for property '{name}'")]
    NoData { name: PropertyName },

    /// The property exists under a different kind than requested
    #[error("Bad type for property '{name}': expected {expected}, found {actual}")]
    BadType {
        name: PropertyName,
        expected: PropertyType,
        actual: PropertyType,
    },
}

/// Failure of a composition or linker operation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Unknown segment {0}")]
    UnknownSegment(SegmentId),

    #[error("Unknown linker {0}")]
    UnknownLinker(LinkerId),

    /// The segment already belongs to a linker
    #[error("Segment {0} is already linked")]
    AlreadyLinked(SegmentId),

    #[error("Segment {0} is not linked")]
    NotLinked(SegmentId),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error(transparent)]
    Property(#[from] PropertyError),
}
