//! Utility modules for the data model

pub mod counters;

pub use counters::Counters;
