//! Linked segment synchronization
//!
//! A [`SegmentLinker`] groups segments that are copies of the same material.
//! After an edit, the changed range of the edited member is replayed into
//! every other member: re-timed to that member's start and transposed by the
//! difference between the two members' link transpositions. Events flagged
//! with `linkedsegmentignoreupdate` are never erased or copied.
//!
//! The linker does not hold segments. Operations take the segment map of the
//! owning composition and look members up by id.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::LinkerConfig;
use crate::models::base_properties::{ACCIDENTAL, INVISIBLE, KEY, LINKED_SEGMENT_IGNORE_UPDATE, PITCH};
use crate::models::event_types::{is_key_change, is_lyric, is_note, KEY_CHANGE};
use crate::models::{Bool, Event, Int, Key, ModelError, Str, Time};
use crate::segment::notation_helper::insert_key_event;
use crate::segment::{RefreshStatusId, Segment, SegmentId};
use crate::transposition::{transpose_pitch, Accidental};

pub type SegmentMap = std::collections::BTreeMap<SegmentId, Segment>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkerId(pub(crate) u32);

impl LinkerId {
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for LinkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "linker {}", self.0)
    }
}

/// Transposition of one linked copy relative to the shared material
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkTransposeParams {
    pub semitones: i32,
    /// Diatonic steps, so that (3, 2) spells a minor third up as C to Eb
    pub steps: i32,
}

impl LinkTransposeParams {
    pub fn new(semitones: i32, steps: i32) -> Self {
        Self { semitones, steps }
    }

    /// Transposition taking material from `from` to `self`
    pub fn relative_to(&self, from: &LinkTransposeParams) -> LinkTransposeParams {
        LinkTransposeParams {
            semitones: self.semitones - from.semitones,
            steps: self.steps - from.steps,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.semitones == 0 && self.steps == 0
    }
}

/// Whether an event is left alone when linked segments are synchronized
pub fn ignores_link_updates(event: &Event) -> bool {
    event.get::<Bool>(&LINKED_SEGMENT_IGNORE_UPDATE).unwrap_or(false)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Member {
    segment: SegmentId,
    refresh: RefreshStatusId,
}

/// What one synchronization pass did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub source: Option<SegmentId>,
    pub targets: usize,
    pub events_copied: usize,
}

#[derive(Debug)]
pub struct SegmentLinker {
    id: LinkerId,
    members: Vec<Member>,
    reference: Option<SegmentId>,
}

impl SegmentLinker {
    pub fn new(id: LinkerId) -> Self {
        Self {
            id,
            members: Vec::new(),
            reference: None,
        }
    }

    pub fn id(&self) -> LinkerId {
        self.id
    }

    pub fn linked_segments(&self) -> impl Iterator<Item = SegmentId> + '_ {
        self.members.iter().map(|member| member.segment)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_linked_to(&self, segment: SegmentId) -> bool {
        self.members.iter().any(|member| member.segment == segment)
    }

    pub fn reference(&self) -> Option<SegmentId> {
        self.reference
    }

    /// Designate the member other copies are derived from
    pub fn set_reference(&mut self, segment: Option<SegmentId>) -> Result<(), ModelError> {
        if let Some(id) = segment {
            if !self.is_linked_to(id) {
                return Err(ModelError::NotLinked(id));
            }
        }
        self.reference = segment;
        Ok(())
    }

    /// Add a segment to this linker. Linking a current member again does nothing.
    pub fn link_segment(&mut self, segments: &mut SegmentMap, id: SegmentId) -> Result<(), ModelError> {
        let segment = segments.get_mut(&id).ok_or(ModelError::UnknownSegment(id))?;
        match segment.linker() {
            Some(linker) if linker == self.id => return Ok(()),
            Some(_) => return Err(ModelError::AlreadyLinked(id)),
            None => {}
        }

        let refresh = segment.new_refresh_status_id();
        segment.set_linker(Some(self.id));
        self.members.push(Member { segment: id, refresh });
        log::debug!("Linked segment {} to {}", id, self.id);
        Ok(())
    }

    /// Remove a segment; returns true when the linker has no members left
    /// and must be destroyed by its owner.
    pub fn unlink_segment(&mut self, segments: &mut SegmentMap, id: SegmentId) -> Result<bool, ModelError> {
        let index = self
            .members
            .iter()
            .position(|member| member.segment == id)
            .ok_or(ModelError::NotLinked(id))?;
        let member = self.members.remove(index);

        if let Some(segment) = segments.get_mut(&id) {
            segment.release_refresh_status(member.refresh);
            segment.set_linker(None);
        }
        if self.reference == Some(id) {
            self.reference = None;
        }

        log::debug!("Unlinked segment {} from {}", id, self.id);
        Ok(self.members.is_empty())
    }

    fn is_dirty(&self, segments: &SegmentMap, member: &Member) -> bool {
        segments
            .get(&member.segment)
            .and_then(|segment| segment.refresh_status(member.refresh))
            .map_or(false, |status| status.needs_refresh())
    }

    /// Propagate the pending change of the first dirty member to the others
    ///
    /// Only one source is handled per pass. Any other member found dirty in
    /// the same pass is reported and its change is dropped. Every member's
    /// pending refresh is cleared on return.
    pub fn update_linked_segments(&self, segments: &mut SegmentMap, config: &LinkerConfig) -> SyncReport {
        let mut report = SyncReport::default();

        let Some(source_index) = self.members.iter().position(|m| self.is_dirty(segments, m)) else {
            return report;
        };
        let source_member = self.members[source_index];

        for other in &self.members[source_index + 1..] {
            if self.is_dirty(segments, other) {
                log::warn!(
                    "{}: segment {} changed in the same pass as segment {}; only the first is propagated",
                    self.id,
                    other.segment,
                    source_member.segment
                );
            }
        }

        let Some(source) = segments.get(&source_member.segment) else {
            self.clear_refresh_statuses(segments);
            return report;
        };
        let Some(status) = source.refresh_status(source_member.refresh) else {
            self.clear_refresh_statuses(segments);
            return report;
        };

        let snapshot = SourceSnapshot::range(source, status.from(), status.to());
        report.source = Some(source_member.segment);

        for member in self.members.iter().filter(|m| m.segment != source_member.segment) {
            let Some(target) = segments.get_mut(&member.segment) else {
                log::warn!("{}: member {} is missing from the composition", self.id, member.segment);
                continue;
            };

            let offset = target.start_time() - snapshot.start_time;
            report.events_copied += snapshot.replay(target, status.from() + offset, status.to() + offset, config);
            report.targets += 1;
        }

        self.clear_refresh_statuses(segments);
        log::debug!(
            "{}: propagated [{}, {}) of segment {} to {} segment(s)",
            self.id,
            status.from(),
            status.to(),
            source_member.segment,
            report.targets
        );
        report
    }

    /// Rebuild `target` wholesale from another member, or from a copy of
    /// itself when it is the only member.
    pub fn refresh_segment(
        &self,
        segments: &mut SegmentMap,
        target: SegmentId,
        config: &LinkerConfig,
    ) -> Result<usize, ModelError> {
        let member = self
            .members
            .iter()
            .find(|member| member.segment == target)
            .copied()
            .ok_or(ModelError::NotLinked(target))?;

        let source_id = self
            .reference
            .filter(|&id| id != target)
            .or_else(|| self.linked_segments().find(|&id| id != target))
            .unwrap_or(target);
        let source = segments.get(&source_id).ok_or(ModelError::UnknownSegment(source_id))?;
        let snapshot = SourceSnapshot::range(source, Time::MIN, Time::MAX);

        let segment = segments.get_mut(&target).ok_or(ModelError::UnknownSegment(target))?;
        let copied = snapshot.replay(segment, Time::MIN, Time::MAX, config);
        segment.clear_refresh_status(member.refresh);

        log::debug!("{}: refreshed segment {} from segment {}", self.id, target, source_id);
        Ok(copied)
    }

    fn clear_refresh_statuses(&self, segments: &mut SegmentMap) {
        for member in &self.members {
            if let Some(segment) = segments.get_mut(&member.segment) {
                segment.clear_refresh_status(member.refresh);
            }
        }
    }
}

/// The part of a source segment that is being copied, detached from the
/// segment map so targets in the same map can be mutated.
struct SourceSnapshot {
    start_time: Time,
    transpose: LinkTransposeParams,
    end_marker: Option<Time>,
    events: Vec<Event>,
}

impl SourceSnapshot {
    fn range(source: &Segment, from: Time, to: Time) -> Self {
        Self {
            start_time: source.start_time(),
            transpose: source.link_transpose_params(),
            end_marker: source.explicit_end_marker_time(),
            events: source
                .range(from, to)
                .filter(|(_, event)| !ignores_link_updates(event))
                .map(|(_, event)| event.clone())
                .collect(),
        }
    }

    /// Replace the non-ignored events of `target` in `[from, to)` with the
    /// snapshot's events; returns how many were copied.
    fn replay(&self, target: &mut Segment, from: Time, to: Time, config: &LinkerConfig) -> usize {
        let offset = target.start_time() - self.start_time;
        let transpose = target.link_transpose_params().relative_to(&self.transpose);

        target.lock_resize_notifications();

        let mut lyrics_touched = erase_non_ignored(target, from, to);
        for event in &self.events {
            lyrics_touched |= is_lyric(event);
            insert_mapped_event(target, event, offset, transpose);
        }

        if config.mirror_end_marker {
            match self.end_marker {
                Some(marker) if target.explicit_end_marker_time() != Some(marker + offset) => {
                    target.set_end_marker_time(marker + offset)
                }
                None if target.explicit_end_marker_time().is_some() => target.clear_end_marker(),
                _ => {}
            }
        }

        target.unlock_resize_notifications();

        if lyrics_touched {
            target.invalidate_verse_count();
        }
        self.events.len()
    }
}

/// Erase every event in `[from, to)` not flagged to be ignored; returns
/// whether any erased event was a lyric.
fn erase_non_ignored(segment: &mut Segment, from: Time, to: Time) -> bool {
    let doomed: Vec<_> = segment
        .range(from, to)
        .filter(|(_, event)| !ignores_link_updates(event))
        .map(|(key, event)| (key, is_lyric(event)))
        .collect();

    let lyrics = doomed.iter().any(|(_, lyric)| *lyric);
    segment.erase_keys(doomed.into_iter().map(|(key, _)| key));
    lyrics
}

/// Insert a copy of `event` moved by `offset` and transposed by `transpose`
fn insert_mapped_event(target: &mut Segment, event: &Event, offset: Time, transpose: LinkTransposeParams) {
    let mut copy = event.shifted(offset);

    if is_key_change(event) {
        match Key::from_event(event) {
            Ok(key) => {
                let transposed = key.transpose(transpose.semitones, transpose.steps);
                if let Err(err) = copy.set::<Str>(&KEY, transposed.name()) {
                    log::warn!("Could not transpose key change at {}: {}", copy.absolute_time(), err);
                }
                insert_key_event(target, copy);
            }
            Err(err) => {
                log::warn!("Copying unreadable key change at {} as is: {}", copy.absolute_time(), err);
                target.insert(copy);
            }
        }
        return;
    }

    if is_note(event) && !transpose.is_identity() {
        transpose_note(&mut copy, transpose);
    }
    target.insert(copy);
}

fn transpose_note(note: &mut Event, transpose: LinkTransposeParams) {
    let Ok(pitch) = note.get::<Int>(&PITCH) else {
        return;
    };
    let accidental = note
        .get::<Str>(&ACCIDENTAL)
        .ok()
        .and_then(|name| name.parse::<Accidental>().ok())
        .unwrap_or_default();

    let (pitch, accidental) = transpose_pitch(pitch, accidental, transpose.semitones, transpose.steps);
    let result = note.set::<Int>(&PITCH, pitch).and_then(|_| {
        if accidental == Accidental::NoAccidental {
            note.unset(&ACCIDENTAL);
            Ok(())
        } else {
            note.set::<Str>(&ACCIDENTAL, accidental.as_str().to_string())
        }
    });
    if let Err(err) = result {
        log::warn!("Could not transpose note at {}: {}", note.absolute_time(), err);
    }
}

/// Insert a hidden C major key at the start of `segment` unless a key
/// change already comes before its first note. Returns whether one was added.
pub(crate) fn insert_implied_key(segment: &mut Segment) -> bool {
    let has_leading_key = segment
        .iter()
        .take_while(|(_, event)| !is_note(event))
        .any(|(_, event)| event.is_a(KEY_CHANGE));
    if has_leading_key {
        return false;
    }

    let start = segment.start_time();
    let implied = Key::default().to_event(start).with::<Bool>(&INVISIBLE, true);
    insert_key_event(segment, implied);
    true
}
