//! Segment change notifications
//!
//! Observers subscribe to a segment and receive a typed notification,
//! synchronously, for every logical change. The registry belongs to the
//! segment; observers never hold a reference back to it.

use std::fmt;

use super::EventKey;
use crate::models::{Event, Time};

#[derive(Clone, Debug, PartialEq)]
pub enum SegmentNotification {
    EventAdded { key: EventKey, event: Event },
    EventRemoved { key: EventKey, event: Event },
    /// Sent instead of per-event notifications after a bulk change
    AllEventsChanged,
    StartChanged { start_time: Time },
    EndMarkerTimeChanged { shorten: bool },
    TransposeChanged { transpose: i32 },
    /// Last notification a segment sends
    Deleted,
}

pub trait SegmentObserver: Send + Sync {
    fn segment_changed(&mut self, notification: &SegmentNotification);
}

impl<F> SegmentObserver for F
where
    F: FnMut(&SegmentNotification) + Send + Sync,
{
    fn segment_changed(&mut self, notification: &SegmentNotification) {
        self(notification)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(u64);

/// Changes collected while resize notifications are locked
#[derive(Debug)]
struct PendingBatch {
    events_changed: bool,
    start_time: Option<Time>,
    end_marker_changed: bool,
    end_marker_at_lock: Time,
}

#[derive(Default)]
pub(crate) struct ObserverRegistry {
    next_id: u64,
    observers: Vec<(ObserverId, Box<dyn SegmentObserver>)>,
    batch: Option<PendingBatch>,
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.observers.len())
            .field("batch", &self.batch)
            .finish()
    }
}

impl ObserverRegistry {
    pub fn add(&mut self, observer: Box<dyn SegmentObserver>) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, observer));
        id
    }

    pub fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_locked(&self) -> bool {
        self.batch.is_some()
    }

    /// Per-event change; the notification is only built when someone will receive it
    pub fn event_changed<F>(&mut self, make: F)
    where
        F: FnOnce() -> SegmentNotification,
    {
        if let Some(batch) = self.batch.as_mut() {
            batch.events_changed = true;
        } else if !self.observers.is_empty() {
            self.dispatch(&make());
        }
    }

    pub fn notify(&mut self, notification: SegmentNotification) {
        if let Some(batch) = self.batch.as_mut() {
            match notification {
                SegmentNotification::EventAdded { .. }
                | SegmentNotification::EventRemoved { .. }
                | SegmentNotification::AllEventsChanged => {
                    batch.events_changed = true;
                    return;
                }
                SegmentNotification::StartChanged { start_time } => {
                    batch.start_time = Some(start_time);
                    return;
                }
                SegmentNotification::EndMarkerTimeChanged { .. } => {
                    batch.end_marker_changed = true;
                    return;
                }
                _ => {}
            }
        }
        self.dispatch(&notification);
    }

    fn dispatch(&mut self, notification: &SegmentNotification) {
        for (_, observer) in self.observers.iter_mut() {
            observer.segment_changed(notification);
        }
    }

    /// Returns false, and changes nothing, if already locked
    pub fn lock(&mut self, end_marker: Time) -> bool {
        if self.batch.is_some() {
            log::warn!("Segment resize notifications are already locked; nested lock ignored");
            return false;
        }
        self.batch = Some(PendingBatch {
            events_changed: false,
            start_time: None,
            end_marker_changed: false,
            end_marker_at_lock: end_marker,
        });
        true
    }

    /// Deliver whatever the batch collected, at most one notification of each kind
    pub fn unlock(&mut self, end_marker: Time) {
        let Some(batch) = self.batch.take() else {
            log::warn!("Segment resize notifications unlocked without a matching lock");
            return;
        };

        if batch.events_changed {
            self.dispatch(&SegmentNotification::AllEventsChanged);
        }
        if let Some(start_time) = batch.start_time {
            self.dispatch(&SegmentNotification::StartChanged { start_time });
        }
        if batch.end_marker_changed {
            self.dispatch(&SegmentNotification::EndMarkerTimeChanged {
                shorten: end_marker < batch.end_marker_at_lock,
            });
        }
    }
}
