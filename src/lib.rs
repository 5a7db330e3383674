//! Notation Core
//!
//! The in-memory musical data model of a notation editor: copy-on-write
//! events with typed properties, time-ordered segments with an end marker
//! and rest filling, and linkers that keep copies of a segment in sync.

pub mod composition;
pub mod config;
pub mod linker;
pub mod models;
pub mod segment;
pub mod transposition;
pub mod utils;

// Re-export commonly used types
pub use composition::Composition;
pub use config::{ConfigError, ModelConfig};
pub use linker::{LinkTransposeParams, LinkerId, SegmentLinker, SyncReport};
pub use models::*;
pub use segment::{EventKey, Segment, SegmentId, SegmentNotification};
