//! Dirty-range tracking for segment clients
//!
//! Each client interested in "what changed since I last looked" (the linker
//! is one) holds a [`RefreshStatusId`]. Every mutation of the segment widens
//! the pending range of all statuses; the client clears its own when done.

use crate::models::Time;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RefreshStatusId(usize);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshStatus {
    from: Time,
    to: Time,
    needs_refresh: bool,
}

impl RefreshStatus {
    pub fn from(&self) -> Time {
        self.from
    }

    pub fn to(&self) -> Time {
        self.to
    }

    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh
    }

    /// Widen the pending range to include `[from, to)`
    pub(crate) fn push(&mut self, from: Time, to: Time) {
        if self.needs_refresh {
            self.from = self.from.min(from);
            self.to = self.to.max(to);
        } else {
            self.from = from;
            self.to = to;
            self.needs_refresh = true;
        }
    }

    pub(crate) fn clear(&mut self) {
        self.needs_refresh = false;
    }
}

/// Statuses indexed by id; released slots stay empty
#[derive(Debug, Default)]
pub(crate) struct RefreshStatusArray {
    statuses: Vec<Option<RefreshStatus>>,
}

impl RefreshStatusArray {
    /// New statuses start clean
    pub fn new_id(&mut self) -> RefreshStatusId {
        if let Some(index) = self.statuses.iter().position(Option::is_none) {
            self.statuses[index] = Some(RefreshStatus::default());
            return RefreshStatusId(index);
        }
        self.statuses.push(Some(RefreshStatus::default()));
        RefreshStatusId(self.statuses.len() - 1)
    }

    pub fn release(&mut self, id: RefreshStatusId) {
        if let Some(slot) = self.statuses.get_mut(id.0) {
            *slot = None;
        }
    }

    pub fn get(&self, id: RefreshStatusId) -> Option<&RefreshStatus> {
        self.statuses.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: RefreshStatusId) -> Option<&mut RefreshStatus> {
        self.statuses.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn push_all(&mut self, from: Time, to: Time) {
        for status in self.statuses.iter_mut().flatten() {
            status.push(from, to);
        }
    }
}
