//! Ordered segment container
//!
//! A segment owns the events of one span of one track, ordered by
//! (absolute time, sub-ordering, insertion order). Its nominal end, the end
//! marker, is tracked separately from the end of the last stored event: the
//! marker may stop short of storage, and extending it past storage fills the
//! difference with rests.
//!
//! Positions are [`EventKey`] handles. A key stays valid until its event is
//! erased; a stale key is simply not found.

pub mod notation_helper;
pub mod observer;
pub mod quantizer;
pub mod refresh;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeBounds;

pub use observer::{ObserverId, SegmentNotification, SegmentObserver};
pub use quantizer::Quantizer;
pub use refresh::{RefreshStatus, RefreshStatusId};

use crate::linker::{LinkTransposeParams, LinkerId};
use crate::models::base_properties::VERSE;
use crate::models::event_types::{is_lyric, rest};
use crate::models::{Event, Int, Time, MIN_SUBORDERING};
use observer::ObserverRegistry;
use refresh::RefreshStatusArray;

pub type TrackId = u32;

/// Identity of a segment within its composition
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentId(pub(crate) u32);

impl SegmentId {
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position of an event inside a segment
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKey {
    time: Time,
    sub_ordering: i16,
    seq: u64,
}

impl EventKey {
    /// Sorts at or before every event at `time`
    fn probe(time: Time) -> Self {
        Self {
            time,
            sub_ordering: MIN_SUBORDERING,
            seq: 0,
        }
    }

    pub fn time(&self) -> Time {
        self.time
    }

    pub fn sub_ordering(&self) -> i16 {
        self.sub_ordering
    }
}

#[derive(Debug)]
pub struct Segment {
    events: BTreeMap<EventKey, Event>,
    next_seq: u64,

    track: TrackId,
    label: String,
    start_time: Time,
    end_marker_time: Option<Time>,
    /// End of the last stored event; `start_time` when empty
    end_time: Time,
    composition_end_marker: Option<Time>,

    /// Playback transposition; stored pitches are not changed
    transpose: i32,
    link_transpose_params: LinkTransposeParams,
    linker: Option<LinkerId>,

    max_rest_duration: Option<Time>,
    quantizer: Option<Quantizer>,

    verse_count: OnceCell<usize>,
    refresh_statuses: RefreshStatusArray,
    observers: ObserverRegistry,
}

impl Clone for Segment {
    /// Copies events and attributes. Observers, refresh statuses and linker
    /// membership belong to the original and are not copied.
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
            next_seq: self.next_seq,
            track: self.track,
            label: self.label.clone(),
            start_time: self.start_time,
            end_marker_time: self.end_marker_time,
            end_time: self.end_time,
            composition_end_marker: self.composition_end_marker,
            transpose: self.transpose,
            link_transpose_params: self.link_transpose_params,
            linker: None,
            max_rest_duration: self.max_rest_duration,
            quantizer: self.quantizer,
            verse_count: OnceCell::new(),
            refresh_statuses: RefreshStatusArray::default(),
            observers: ObserverRegistry::default(),
        }
    }
}

impl Segment {
    pub fn new(track: TrackId, start_time: Time) -> Self {
        Self {
            events: BTreeMap::new(),
            next_seq: 0,
            track,
            label: String::new(),
            start_time,
            end_marker_time: None,
            end_time: start_time,
            composition_end_marker: None,
            transpose: 0,
            link_transpose_params: LinkTransposeParams::default(),
            linker: None,
            max_rest_duration: None,
            quantizer: None,
            verse_count: OnceCell::new(),
            refresh_statuses: RefreshStatusArray::default(),
            observers: ObserverRegistry::default(),
        }
    }

    pub fn track(&self) -> TrackId {
        self.track
    }

    pub fn set_track(&mut self, track: TrackId) {
        self.track = track;
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label<T: Into<String>>(&mut self, label: T) {
        self.label = label.into();
    }

    pub fn transpose(&self) -> i32 {
        self.transpose
    }

    pub fn set_transpose(&mut self, transpose: i32) {
        if transpose != self.transpose {
            self.transpose = transpose;
            self.observers.notify(SegmentNotification::TransposeChanged { transpose });
        }
    }

    pub fn link_transpose_params(&self) -> LinkTransposeParams {
        self.link_transpose_params
    }

    pub fn set_link_transpose_params(&mut self, params: LinkTransposeParams) {
        self.link_transpose_params = params;
    }

    pub fn linker(&self) -> Option<LinkerId> {
        self.linker
    }

    pub fn is_linked(&self) -> bool {
        self.linker.is_some()
    }

    pub(crate) fn set_linker(&mut self, linker: Option<LinkerId>) {
        self.linker = linker;
    }

    pub fn max_rest_duration(&self) -> Option<Time> {
        self.max_rest_duration
    }

    /// Longest single rest `fill_with_rests` will insert; `None` for no limit
    pub fn set_max_rest_duration(&mut self, max: Option<Time>) {
        self.max_rest_duration = max.filter(|&m| m > 0);
    }

    // ----- storage -----

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (EventKey, &Event)> + '_ {
        self.events.iter().map(|(key, event)| (*key, event))
    }

    /// Events in `[from, to)` by absolute time
    pub fn range(&self, from: Time, to: Time) -> impl DoubleEndedIterator<Item = (EventKey, &Event)> + '_ {
        self.events
            .range(EventKey::probe(from)..EventKey::probe(to.max(from)))
            .map(|(key, event)| (*key, event))
    }

    /// Events from the start up to, not including, the end marker
    pub fn iter_to_end_marker(&self) -> impl Iterator<Item = (EventKey, &Event)> + '_ {
        let end_marker = self.end_marker_time(true);
        self.iter().take_while(move |(key, _)| key.time < end_marker)
    }

    pub fn get(&self, key: EventKey) -> Option<&Event> {
        self.events.get(&key)
    }

    /// Mutable access to an event's properties. The event's extent is marked
    /// as changed for refresh tracking.
    pub fn get_mut(&mut self, key: EventKey) -> Option<&mut Event> {
        let event = self.events.get_mut(&key)?;
        let end = key.time + event.duration();
        self.refresh_statuses.push_all(key.time, end.max(key.time + 1));
        Some(event)
    }

    pub fn contains(&self, key: EventKey) -> bool {
        self.events.contains_key(&key)
    }

    pub fn first_key(&self) -> Option<EventKey> {
        self.events.keys().next().copied()
    }

    pub fn last_key(&self) -> Option<EventKey> {
        self.events.keys().next_back().copied()
    }

    /// Take ownership of an event and return its position
    pub fn insert(&mut self, event: Event) -> EventKey {
        let time = event.absolute_time();
        let end = time + event.duration();
        let key = EventKey {
            time,
            sub_ordering: event.sub_ordering(),
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.events.insert(key, event);

        let events = &self.events;
        self.observers.event_changed(|| SegmentNotification::EventAdded {
            key,
            event: events[&key].clone(),
        });

        if time < self.start_time {
            self.start_time = time;
            self.observers.notify(SegmentNotification::StartChanged { start_time: time });
        }

        if end > self.end_time {
            self.end_time = end;
            if self.end_marker_time.is_none() {
                self.observers
                    .notify(SegmentNotification::EndMarkerTimeChanged { shorten: false });
            }
        }

        self.refresh_statuses.push_all(time, end.max(time + 1));
        key
    }

    /// Remove an event; the segment gives up ownership of it.
    /// The start time is left where it is.
    pub fn erase(&mut self, key: EventKey) -> Option<Event> {
        let old_end = self.end_time;
        let event = self.remove_event(key)?;
        if key.time + event.duration() >= old_end {
            self.end_time_shrunk(old_end);
        }
        Some(event)
    }

    /// Erase every event whose key falls in `range`; returns how many
    pub fn erase_range<R: RangeBounds<EventKey>>(&mut self, range: R) -> usize {
        let keys: Vec<EventKey> = self.events.range(range).map(|(key, _)| *key).collect();
        self.erase_keys(keys)
    }

    /// Erase the events at `keys`, skipping any that are not stored;
    /// returns how many were erased
    pub fn erase_keys<I: IntoIterator<Item = EventKey>>(&mut self, keys: I) -> usize {
        self.batched(|segment| {
            let old_end = segment.end_time;
            let mut erased = 0;
            let mut reached_end = false;
            for key in keys {
                if let Some(event) = segment.remove_event(key) {
                    reached_end |= key.time + event.duration() >= old_end;
                    erased += 1;
                }
            }
            if reached_end {
                segment.end_time_shrunk(old_end);
            }
            erased
        })
    }

    /// Take an event out of storage, leaving `end_time` for the caller
    fn remove_event(&mut self, key: EventKey) -> Option<Event> {
        let event = self.events.remove(&key)?;
        let time = key.time;
        let end = time + event.duration();

        self.refresh_statuses.push_all(time, end.max(time + 1));
        self.observers.event_changed(|| SegmentNotification::EventRemoved {
            key,
            event: event.clone(),
        });
        Some(event)
    }

    /// Recompute `end_time` after events ending at `old_end` were removed
    fn end_time_shrunk(&mut self, old_end: Time) {
        self.recompute_end_time();
        if self.end_time != old_end && self.end_marker_time.is_none() {
            self.observers
                .notify(SegmentNotification::EndMarkerTimeChanged { shorten: true });
        }
    }

    /// Run a bulk change with notifications collected, so observers see
    /// one of each kind. Joins a batch the caller already opened.
    fn batched<R>(&mut self, change: impl FnOnce(&mut Self) -> R) -> R {
        if self.observers.is_locked() {
            return change(self);
        }
        self.lock_resize_notifications();
        let result = change(self);
        self.unlock_resize_notifications();
        result
    }

    /// Erase every event starting in `[from, to)`
    pub fn erase_time_range(&mut self, from: Time, to: Time) -> usize {
        self.erase_range(EventKey::probe(from)..EventKey::probe(to.max(from)))
    }

    /// Position of a stored event equal to `event`, searched at its time
    pub fn find_single(&self, event: &Event) -> Option<EventKey> {
        self.time_slice(event.absolute_time())
            .find(|(_, stored)| *stored == event)
            .map(|(key, _)| key)
    }

    pub fn erase_single(&mut self, event: &Event) -> bool {
        match self.find_single(event) {
            Some(key) => self.erase(key).is_some(),
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.erase_range(..);
    }

    // ----- searching -----

    /// First event at or after `time`
    pub fn find_time(&self, time: Time) -> Option<EventKey> {
        self.events
            .range(EventKey::probe(time)..)
            .next()
            .map(|(key, _)| *key)
    }

    /// First event at exactly `time` if there is one, otherwise the last event before it
    pub fn find_nearest_time(&self, time: Time) -> Option<EventKey> {
        match self.find_time(time) {
            Some(key) if key.time == time => Some(key),
            _ => self
                .events
                .range(..EventKey::probe(time))
                .next_back()
                .map(|(key, _)| *key),
        }
    }

    /// All events at exactly `time`
    pub fn time_slice(&self, time: Time) -> impl DoubleEndedIterator<Item = (EventKey, &Event)> + '_ {
        self.range(time, time + 1)
    }

    // ----- time extent -----

    pub fn start_time(&self) -> Time {
        self.start_time
    }

    /// Move the segment, and every event in it, to start at `start_time`
    pub fn set_start_time(&mut self, start_time: Time) {
        if start_time < 0 {
            log::warn!("Ignoring negative segment start time {}", start_time);
            return;
        }
        let delta = start_time - self.start_time;
        if delta == 0 {
            return;
        }

        let old_start = self.start_time;
        let old_end = self.end_time;

        let events = std::mem::take(&mut self.events);
        self.events = events
            .into_iter()
            .map(|(key, event)| {
                let moved = EventKey {
                    time: key.time + delta,
                    ..key
                };
                (moved, event.shifted(delta))
            })
            .collect();

        self.start_time = start_time;
        if let Some(marker) = self.end_marker_time.as_mut() {
            *marker += delta;
        }
        self.recompute_end_time();

        let from = old_start.min(start_time);
        let to = old_end.max(self.end_time).max(from + 1);
        self.refresh_statuses.push_all(from, to);

        self.observers.notify(SegmentNotification::AllEventsChanged);
        self.observers.notify(SegmentNotification::StartChanged { start_time });
        self.observers.notify(SegmentNotification::EndMarkerTimeChanged { shorten: delta < 0 });
    }

    /// End of the last stored event
    pub fn end_time(&self) -> Time {
        self.end_time
    }

    /// Nominal end: the explicit marker if set, otherwise the end of storage,
    /// optionally clipped to the composition's end marker
    pub fn end_marker_time(&self, clip_to_composition: bool) -> Time {
        let end = self.end_marker_time.unwrap_or(self.end_time);
        match self.composition_end_marker {
            Some(composition_end) if clip_to_composition => end.min(composition_end),
            _ => end,
        }
    }

    /// The explicit end marker, if one is set
    pub fn explicit_end_marker_time(&self) -> Option<Time> {
        self.end_marker_time
    }

    pub(crate) fn set_composition_end_marker(&mut self, end: Option<Time>) {
        self.composition_end_marker = end;
    }

    /// Set the nominal end
    ///
    /// Moving it past the end of storage fills the difference with rests.
    /// Moving it earlier leaves stored events alone; they are simply beyond
    /// the marker.
    pub fn set_end_marker_time(&mut self, time: Time) {
        self.batched(|segment| segment.move_end_marker(time));
    }

    fn move_end_marker(&mut self, time: Time) {
        let time = time.max(self.start_time);
        let end_time = self.end_time;
        let old_marker = self.end_marker_time(false);
        let had_marker = self.end_marker_time.is_some();

        self.end_marker_time = Some(time);

        if time > end_time {
            self.fill_with_rests(end_time, time);
            if old_marker < end_time {
                self.refresh_statuses.push_all(old_marker, time);
            }
        } else {
            if old_marker < time {
                self.refresh_statuses.push_all(old_marker, time);
            }
            if time < end_time {
                self.refresh_statuses.push_all(time, end_time);
            }
        }

        if time != old_marker || !had_marker {
            self.observers.notify(SegmentNotification::EndMarkerTimeChanged {
                shorten: time < old_marker,
            });
        }
    }

    /// Drop the explicit marker so the nominal end follows storage again
    pub fn clear_end_marker(&mut self) {
        if let Some(old_marker) = self.end_marker_time.take() {
            let from = old_marker.min(self.end_time);
            let to = old_marker.max(self.end_time).max(from + 1);
            self.refresh_statuses.push_all(from, to);
            self.observers.notify(SegmentNotification::EndMarkerTimeChanged {
                shorten: self.end_time < old_marker,
            });
        }
    }

    /// Set the end of storage
    ///
    /// Extending fills with rests. Shrinking erases every event starting at
    /// or after `time`; an event straddling `time` is kept whole, and the end
    /// marker is moved to `time`.
    pub fn set_end_time(&mut self, time: Time) {
        let time = time.max(self.start_time);

        self.batched(|segment| {
            if time < segment.end_time {
                segment.erase_range(EventKey::probe(time)..);
                if segment.end_marker_time != Some(time) {
                    segment.move_end_marker(time);
                }
            } else if time > segment.end_time {
                let end_time = segment.end_time;
                segment.fill_with_rests(end_time, time);
                if segment.end_marker_time.is_some() {
                    segment.move_end_marker(time);
                }
            }
        });
    }

    /// Whether `key` names a stored event that starts before the end marker
    pub fn is_before_end_marker(&self, key: EventKey) -> bool {
        self.events.contains_key(&key) && key.time < self.end_marker_time(true)
    }

    fn recompute_end_time(&mut self) {
        self.end_time = self
            .events
            .iter()
            .map(|(key, event)| key.time + event.duration())
            .max()
            .unwrap_or(self.start_time)
            .max(self.start_time);
    }

    /// Insert rests into every part of `[from, to)` no event covers;
    /// returns the number of rests inserted
    pub fn fill_with_rests(&mut self, from: Time, to: Time) -> usize {
        if from >= to {
            return 0;
        }

        let mut gaps = Vec::new();
        let mut cursor = from;
        for (key, event) in self.events.range(..EventKey::probe(to)) {
            if event.duration() <= 0 {
                continue;
            }
            let end = key.time + event.duration();
            if end <= cursor {
                continue;
            }
            if key.time > cursor {
                gaps.push((cursor, key.time));
            }
            cursor = end;
            if cursor >= to {
                break;
            }
        }
        if cursor < to {
            gaps.push((cursor, to));
        }

        let max_rest_duration = self.max_rest_duration;
        let inserted = self.batched(|segment| {
            let mut inserted = 0;
            for (gap_start, gap_end) in gaps {
                let mut time = gap_start;
                while time < gap_end {
                    let duration = match max_rest_duration {
                        Some(max) => (gap_end - time).min(max),
                        None => gap_end - time,
                    };
                    segment.insert(rest(time, duration));
                    time += duration;
                    inserted += 1;
                }
            }
            inserted
        });

        log::debug!("Filled [{}, {}) with {} rest(s)", from, to, inserted);
        inserted
    }

    // ----- refresh tracking -----

    pub fn new_refresh_status_id(&mut self) -> RefreshStatusId {
        self.refresh_statuses.new_id()
    }

    pub fn release_refresh_status(&mut self, id: RefreshStatusId) {
        self.refresh_statuses.release(id);
    }

    pub fn refresh_status(&self, id: RefreshStatusId) -> Option<RefreshStatus> {
        self.refresh_statuses.get(id).copied()
    }

    /// Record that `[from, to)` changed, for every refresh client
    pub fn update_refresh_statuses(&mut self, from: Time, to: Time) {
        self.refresh_statuses.push_all(from, to.max(from + 1));
    }

    pub fn clear_refresh_status(&mut self, id: RefreshStatusId) {
        if let Some(status) = self.refresh_statuses.get_mut(id) {
            status.clear();
        }
    }

    // ----- lyrics -----

    /// Number of lyric verses: highest verse index plus one
    pub fn verse_count(&self) -> usize {
        *self.verse_count.get_or_init(|| {
            self.events
                .values()
                .filter(|event| is_lyric(event))
                .map(|event| event.get::<Int>(&VERSE).unwrap_or(0).max(0) as usize + 1)
                .max()
                .unwrap_or(0)
        })
    }

    pub fn invalidate_verse_count(&mut self) {
        self.verse_count.take();
    }

    // ----- quantization -----

    pub fn quantizer(&self) -> Option<Quantizer> {
        self.quantizer
    }

    pub fn set_quantizer(&mut self, quantizer: Option<Quantizer>) {
        self.quantizer = quantizer;
    }

    /// Write quantized notation time and duration on every event. The
    /// extent of the events that changed is marked for refresh and observers
    /// get one `AllEventsChanged`.
    pub fn quantize(&mut self) {
        let Some(quantizer) = self.quantizer else {
            return;
        };

        let mut changed: Option<(Time, Time)> = None;
        for (key, event) in self.events.iter_mut() {
            let before = (event.notation_absolute_time(), event.notation_duration());
            quantizer.quantize_event(event);
            let after = (event.notation_absolute_time(), event.notation_duration());
            if before != after {
                let from = key.time.min(after.0);
                let to = (key.time + event.duration())
                    .max(before.0 + before.1)
                    .max(after.0 + after.1);
                changed = Some(match changed {
                    Some((lo, hi)) => (lo.min(from), hi.max(to)),
                    None => (from, to),
                });
            }
        }

        if let Some((from, to)) = changed {
            self.refresh_statuses.push_all(from, to.max(from + 1));
            self.observers.notify(SegmentNotification::AllEventsChanged);
        }
    }

    // ----- observers -----

    pub fn add_observer<O: SegmentObserver + 'static>(&mut self, observer: O) -> ObserverId {
        self.observers.add(Box::new(observer))
    }

    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Tell observers that everything may have changed
    pub fn notify_all_events_changed(&mut self) {
        self.observers.notify(SegmentNotification::AllEventsChanged);
    }

    pub(crate) fn notify_deleted(&mut self) {
        self.observers.notify(SegmentNotification::Deleted);
    }

    /// Start collecting notifications instead of delivering them. Must be
    /// paired with exactly one `unlock_resize_notifications`; does not nest.
    pub fn lock_resize_notifications(&mut self) {
        let end_marker = self.end_marker_time(false);
        self.observers.lock(end_marker);
    }

    /// Deliver the collected changes as at most one notification of each kind
    pub fn unlock_resize_notifications(&mut self) {
        let end_marker = self.end_marker_time(false);
        self.observers.unlock(end_marker);
    }

    pub fn resize_notifications_locked(&self) -> bool {
        self.observers.is_locked()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event_types::{is_rest, lyric, note, REST};
    use std::sync::{Arc, Mutex};

    fn recorder(segment: &mut Segment) -> Arc<Mutex<Vec<SegmentNotification>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        segment.add_observer(move |n: &SegmentNotification| sink.lock().unwrap().push(n.clone()));
        log
    }

    #[test]
    fn test_events_ordered_by_time_then_sub_ordering() {
        let mut s = Segment::new(0, 0);
        s.insert(note(480, 240, 60));
        s.insert(rest(0, 480));
        s.insert(Event::new("clefchange", 0, 0, -250));

        let order: Vec<(Time, i16)> = s.iter().map(|(k, _)| (k.time(), k.sub_ordering())).collect();
        assert_eq!(order, vec![(0, -250), (0, 10), (480, 0)]);
    }

    #[test]
    fn test_equal_positions_keep_insertion_order() {
        let mut s = Segment::new(0, 0);
        let a = s.insert(note(0, 240, 60));
        let b = s.insert(note(0, 240, 64));
        let slice: Vec<EventKey> = s.time_slice(0).map(|(k, _)| k).collect();
        assert_eq!(slice, vec![a, b]);
    }

    #[test]
    fn test_find_time_and_nearest() {
        let mut s = Segment::new(0, 0);
        let first = s.insert(note(0, 240, 60));
        let second = s.insert(note(480, 240, 62));

        assert_eq!(s.find_time(1), Some(second));
        assert_eq!(s.find_time(481), None);
        assert_eq!(s.find_nearest_time(300), Some(first));
        assert_eq!(s.find_nearest_time(480), Some(second));
    }

    #[test]
    fn test_insert_before_start_moves_start() {
        let mut s = Segment::new(0, 960);
        s.insert(note(480, 240, 60));
        assert_eq!(s.start_time(), 480);
    }

    #[test]
    fn test_erase_recomputes_end_time() {
        let mut s = Segment::new(0, 0);
        s.insert(note(0, 240, 60));
        let last = s.insert(note(240, 720, 62));
        assert_eq!(s.end_time(), 960);
        s.erase(last);
        assert_eq!(s.end_time(), 240);
        assert!(s.erase(last).is_none());
    }

    #[test]
    fn test_extend_end_marker_fills_with_rests() {
        let mut s = Segment::new(0, 0);
        s.set_end_marker_time(960);
        assert_eq!(s.end_marker_time(true), 960);
        assert_eq!(s.len(), 1);
        let (key, event) = s.iter().next().unwrap();
        assert!(event.is_a(REST));
        assert_eq!((key.time(), event.duration()), (0, 960));
    }

    #[test]
    fn test_rests_split_at_max_duration() {
        let mut s = Segment::new(0, 0);
        s.set_max_rest_duration(Some(400));
        s.set_end_marker_time(960);
        let durations: Vec<Time> = s.iter().map(|(_, e)| e.duration()).collect();
        assert_eq!(durations, vec![400, 400, 160]);
    }

    #[test]
    fn test_fill_with_rests_only_fills_gaps() {
        let mut s = Segment::new(0, 0);
        s.insert(note(240, 240, 60));
        s.insert(note(600, 120, 62));
        assert_eq!(s.fill_with_rests(0, 960), 3);

        let rests: Vec<(Time, Time)> = s
            .iter()
            .filter(|(_, e)| is_rest(e))
            .map(|(k, e)| (k.time(), e.duration()))
            .collect();
        assert_eq!(rests, vec![(0, 240), (480, 120), (720, 240)]);
    }

    #[test]
    fn test_shrinking_marker_keeps_events() {
        let mut s = Segment::new(0, 0);
        s.insert(note(0, 480, 60));
        s.insert(note(480, 480, 62));
        s.set_end_marker_time(480);

        assert_eq!(s.len(), 2);
        assert_eq!(s.end_time(), 960);
        assert_eq!(s.end_marker_time(true), 480);
        assert_eq!(s.iter_to_end_marker().count(), 1);
    }

    #[test]
    fn test_set_end_time_keeps_straddling_event() {
        let mut s = Segment::new(0, 0);
        let straddler = s.insert(note(0, 600, 60));
        s.insert(note(600, 240, 62));
        s.insert(note(480, 0, 64));

        s.set_end_time(480);
        assert_eq!(s.len(), 1);
        assert_eq!(s.get(straddler).unwrap().duration(), 600);
        assert_eq!(s.end_time(), 600);
        assert_eq!(s.end_marker_time(true), 480);
    }

    #[test]
    fn test_is_before_end_marker() {
        let mut s = Segment::new(0, 0);
        let inside = s.insert(note(0, 480, 60));
        let outside = s.insert(note(480, 480, 62));
        s.set_end_marker_time(480);
        assert!(s.is_before_end_marker(inside));
        assert!(!s.is_before_end_marker(outside));

        s.erase(inside);
        assert!(!s.is_before_end_marker(inside));
    }

    #[test]
    fn test_set_start_time_moves_everything() {
        let mut s = Segment::new(0, 0);
        s.insert(note(0, 240, 60));
        s.set_end_marker_time(960);
        s.set_start_time(1920);

        assert_eq!(s.start_time(), 1920);
        assert_eq!(s.first_key().unwrap().time(), 1920);
        assert_eq!(s.end_marker_time(false), 2880);
        assert_eq!(s.end_time(), 2880);
    }

    #[test]
    fn test_negative_start_time_is_ignored() {
        let mut s = Segment::new(0, 0);
        let key = s.insert(note(0, 240, 60));
        let log = recorder(&mut s);

        s.set_start_time(-100);
        assert_eq!(s.start_time(), 0);
        assert_eq!(s.first_key(), Some(key));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_refresh_status_tracks_changes() {
        let mut s = Segment::new(0, 0);
        let id = s.new_refresh_status_id();
        assert!(!s.refresh_status(id).unwrap().needs_refresh());

        s.insert(note(240, 240, 60));
        s.insert(note(960, 0, 62));
        let status = s.refresh_status(id).unwrap();
        assert!(status.needs_refresh());
        assert_eq!((status.from(), status.to()), (240, 961));

        s.clear_refresh_status(id);
        assert!(!s.refresh_status(id).unwrap().needs_refresh());
    }

    #[test]
    fn test_verse_count_refreshes_only_when_invalidated() {
        let mut s = Segment::new(0, 0);
        s.insert(lyric(0, "la", 0));
        assert_eq!(s.verse_count(), 1);

        // Plain inserts keep the cached count; the linker or
        // invalidate_verse_count refreshes it.
        s.insert(lyric(0, "lo", 2));
        assert_eq!(s.verse_count(), 1);
        s.invalidate_verse_count();
        assert_eq!(s.verse_count(), 3);
    }

    #[test]
    fn test_quantize_only_touches_notation_time() {
        let mut s = Segment::new(0, 0);
        let key = s.insert(note(250, 200, 60));
        s.set_quantizer(Some(Quantizer::new(240)));
        s.quantize();

        let e = s.get(key).unwrap();
        assert_eq!(e.absolute_time(), 250);
        assert_eq!(e.notation_absolute_time(), 240);
        assert_eq!(s.find_time(250), Some(key));
    }

    #[test]
    fn test_quantize_reports_changed_extent() {
        let mut s = Segment::new(0, 0);
        s.insert(note(0, 240, 60));
        s.insert(note(250, 200, 62));
        s.set_quantizer(Some(Quantizer::new(240)));
        let id = s.new_refresh_status_id();
        let log = recorder(&mut s);

        s.quantize();
        let status = s.refresh_status(id).unwrap();
        assert_eq!((status.from(), status.to()), (240, 480));
        assert_eq!(*log.lock().unwrap(), vec![SegmentNotification::AllEventsChanged]);

        // Already on the grid: nothing to report
        s.clear_refresh_status(id);
        s.quantize();
        assert!(!s.refresh_status(id).unwrap().needs_refresh());
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_notifications_per_event() {
        let mut s = Segment::new(0, 0);
        let log = recorder(&mut s);

        let key = s.insert(note(0, 240, 60));
        s.erase(key);

        let log = log.lock().unwrap();
        assert!(matches!(log[0], SegmentNotification::EventAdded { .. }));
        assert_eq!(log[1], SegmentNotification::EndMarkerTimeChanged { shorten: false });
        assert!(matches!(log[2], SegmentNotification::EventRemoved { .. }));
        assert_eq!(log[3], SegmentNotification::EndMarkerTimeChanged { shorten: true });
        assert_eq!(log.len(), 4);
    }

    #[test]
    fn test_extending_end_time_notifies_once() {
        let mut s = Segment::new(0, 0);
        s.set_max_rest_duration(Some(240));
        let log = recorder(&mut s);

        s.set_end_time(960);
        assert_eq!(s.len(), 4);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                SegmentNotification::AllEventsChanged,
                SegmentNotification::EndMarkerTimeChanged { shorten: false },
            ]
        );
    }

    #[test]
    fn test_erasing_the_tail_notifies_once() {
        let mut s = Segment::new(0, 0);
        for i in 0..4 {
            s.insert(note(i * 240, 240, 60));
        }
        let log = recorder(&mut s);

        assert_eq!(s.erase_time_range(240, 10000), 3);
        assert_eq!(s.end_time(), 240);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                SegmentNotification::AllEventsChanged,
                SegmentNotification::EndMarkerTimeChanged { shorten: true },
            ]
        );
    }

    #[test]
    fn test_erase_keys_skips_missing() {
        let mut s = Segment::new(0, 0);
        let first = s.insert(note(0, 240, 60));
        let last = s.insert(note(240, 480, 62));
        s.erase(first);

        assert_eq!(s.erase_keys(vec![first, last]), 1);
        assert!(s.is_empty());
        assert_eq!(s.end_time(), 0);
    }

    #[test]
    fn test_locked_notifications_are_coalesced() {
        let mut s = Segment::new(0, 0);
        let log = recorder(&mut s);

        s.lock_resize_notifications();
        for i in 0..8 {
            s.insert(note(i * 240, 240, 60));
        }
        s.set_end_marker_time(3840);
        assert!(log.lock().unwrap().is_empty());
        s.unlock_resize_notifications();

        let log = log.lock().unwrap();
        assert_eq!(
            *log,
            vec![
                SegmentNotification::AllEventsChanged,
                SegmentNotification::EndMarkerTimeChanged { shorten: false },
            ]
        );
    }

    #[test]
    fn test_nested_lock_is_ignored() {
        let mut s = Segment::new(0, 0);
        let log = recorder(&mut s);

        s.lock_resize_notifications();
        s.lock_resize_notifications();
        s.insert(note(0, 240, 60));
        s.unlock_resize_notifications();
        assert!(!s.resize_notifications_locked());
        s.unlock_resize_notifications();

        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_clone_drops_observers_and_linker() {
        let mut s = Segment::new(3, 0);
        s.add_observer(|_: &SegmentNotification| {});
        s.insert(note(0, 240, 60));

        let copy = s.clone();
        assert_eq!(copy.len(), 1);
        assert_eq!(copy.track(), 3);
        assert_eq!(copy.observer_count(), 0);
        assert!(!copy.is_linked());

        let (_, original) = s.iter().next().unwrap();
        let (_, cloned) = copy.iter().next().unwrap();
        assert!(original.is_sharing_data_with(cloned));
    }

    #[test]
    fn test_transpose_notifies_on_change_only() {
        let mut s = Segment::new(0, 0);
        let log = recorder(&mut s);
        s.set_transpose(0);
        s.set_transpose(-12);
        assert_eq!(
            *log.lock().unwrap(),
            vec![SegmentNotification::TransposeChanged { transpose: -12 }]
        );
    }
}
