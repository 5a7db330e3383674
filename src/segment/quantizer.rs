//! Grid quantizer for notation times
//!
//! Quantizing never moves an event in its segment: it only writes the
//! notation time and duration that rendering reads.

use serde::{Deserialize, Serialize};

use crate::models::{Event, Time};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantizer {
    unit: Time,
}

impl Quantizer {
    /// Units below one tick are raised to one tick
    pub fn new(unit: Time) -> Self {
        Self { unit: unit.max(1) }
    }

    pub fn unit(&self) -> Time {
        self.unit
    }

    /// Nearest grid line, ties rounding up
    pub fn quantize_time(&self, time: Time) -> Time {
        (time + self.unit / 2).div_euclid(self.unit) * self.unit
    }

    /// Quantized (time, duration); a sounding event never quantizes to zero length
    pub fn quantize(&self, time: Time, duration: Time) -> (Time, Time) {
        let start = self.quantize_time(time);
        let end = self.quantize_time(time + duration);
        let quantized = if duration > 0 { (end - start).max(self.unit) } else { 0 };
        (start, quantized)
    }

    pub fn quantize_event(&self, event: &mut Event) {
        let (time, duration) = self.quantize(event.absolute_time(), event.duration());
        event.set_notation_absolute_time(time);
        event.set_notation_duration(duration);
    }
}
