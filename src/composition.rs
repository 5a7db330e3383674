//! Composition: the owner of segments and linkers
//!
//! The command layer edits segments through `segment_mut` and then calls
//! [`Composition::command_executed`], which lets every linker propagate the
//! change to the other copies of the edited material.

use std::collections::BTreeMap;

use crate::config::ModelConfig;
use crate::linker::{insert_implied_key, LinkerId, SegmentLinker, SegmentMap, SyncReport};
use crate::models::{ModelError, Time};
use crate::segment::{Segment, SegmentId};
use crate::utils::Counters;

#[derive(Debug, Default)]
pub struct Composition {
    config: ModelConfig,
    segments: SegmentMap,
    linkers: BTreeMap<LinkerId, SegmentLinker>,
    next_segment_id: u32,
    next_linker_id: u32,
    end_marker: Option<Time>,
    counters: Counters,
}

impl Composition {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    // ----- segments -----

    /// Take ownership of a segment. Segment settings it lacks come from the config.
    pub fn add_segment(&mut self, mut segment: Segment) -> SegmentId {
        let id = SegmentId(self.next_segment_id);
        self.next_segment_id += 1;

        self.config.segment.apply(&mut segment);
        segment.set_composition_end_marker(self.end_marker);
        self.segments.insert(id, segment);
        log::debug!("Added segment {}", id);
        id
    }

    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(&id)
    }

    pub fn segment_mut(&mut self, id: SegmentId) -> Option<&mut Segment> {
        self.segments.get_mut(&id)
    }

    pub fn segments(&self) -> impl Iterator<Item = (SegmentId, &Segment)> + '_ {
        self.segments.iter().map(|(id, segment)| (*id, segment))
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Remove a segment, unlinking it first. Its observers receive `Deleted`.
    pub fn remove_segment(&mut self, id: SegmentId) -> Result<Segment, ModelError> {
        if !self.segments.contains_key(&id) {
            return Err(ModelError::UnknownSegment(id));
        }
        if self.segments[&id].is_linked() {
            self.unlink_segment(id)?;
        }

        let mut segment = self.segments.remove(&id).ok_or(ModelError::UnknownSegment(id))?;
        segment.notify_deleted();
        segment.set_composition_end_marker(None);
        log::debug!("Removed segment {}", id);
        Ok(segment)
    }

    pub fn end_marker(&self) -> Option<Time> {
        self.end_marker
    }

    /// Global end; segments clip their end marker to it on request
    pub fn set_end_marker(&mut self, end_marker: Option<Time>) {
        self.end_marker = end_marker;
        for segment in self.segments.values_mut() {
            segment.set_composition_end_marker(end_marker);
        }
    }

    // ----- linkers -----

    pub fn linker(&self, id: LinkerId) -> Option<&SegmentLinker> {
        self.linkers.get(&id)
    }

    pub fn linker_mut(&mut self, id: LinkerId) -> Option<&mut SegmentLinker> {
        self.linkers.get_mut(&id)
    }

    /// The linker a segment belongs to, if any
    pub fn linker_of(&self, segment: SegmentId) -> Option<&SegmentLinker> {
        self.segments
            .get(&segment)
            .and_then(|s| s.linker())
            .and_then(|id| self.linkers.get(&id))
    }

    pub fn linker_count(&self) -> usize {
        self.linkers.len()
    }

    fn create_linker(&mut self) -> LinkerId {
        let id = LinkerId(self.next_linker_id);
        self.next_linker_id += 1;
        self.linkers.insert(id, SegmentLinker::new(id));
        self.counters.increment(Counters::LINKERS_CREATED);
        id
    }

    /// Link two segments. If either is already linked the other joins its
    /// linker; otherwise a new linker is created.
    pub fn link_segments(&mut self, a: SegmentId, b: SegmentId) -> Result<LinkerId, ModelError> {
        let linker_a = self.segments.get(&a).ok_or(ModelError::UnknownSegment(a))?.linker();
        let linker_b = self.segments.get(&b).ok_or(ModelError::UnknownSegment(b))?.linker();

        let (linker_id, joining) = match (linker_a, linker_b) {
            (Some(la), Some(lb)) if la == lb => return Ok(la),
            (Some(_), Some(_)) => return Err(ModelError::AlreadyLinked(b)),
            (Some(la), None) => (la, vec![b]),
            (None, Some(lb)) => (lb, vec![a]),
            (None, None) => (self.create_linker(), vec![a, b]),
        };

        let linker = self
            .linkers
            .get_mut(&linker_id)
            .ok_or(ModelError::UnknownLinker(linker_id))?;
        for id in joining {
            linker.link_segment(&mut self.segments, id)?;
        }
        Ok(linker_id)
    }

    /// Remove a segment from its linker, destroying the linker once it is empty
    pub fn unlink_segment(&mut self, id: SegmentId) -> Result<(), ModelError> {
        let linker_id = self
            .segments
            .get(&id)
            .ok_or(ModelError::UnknownSegment(id))?
            .linker()
            .ok_or(ModelError::NotLinked(id))?;
        let linker = self
            .linkers
            .get_mut(&linker_id)
            .ok_or(ModelError::UnknownLinker(linker_id))?;

        if linker.unlink_segment(&mut self.segments, id)? {
            self.linkers.remove(&linker_id);
            log::debug!("Destroyed empty {}", linker_id);
        }
        Ok(())
    }

    /// Add a linked copy of `source` and return its id
    ///
    /// When configured, a hidden C major key is first added to the source if
    /// no key change comes before its first note, so the copy starts with a
    /// well-defined key wherever it is placed.
    pub fn create_linked_segment(&mut self, source: SegmentId) -> Result<SegmentId, ModelError> {
        let segment = self
            .segments
            .get_mut(&source)
            .ok_or(ModelError::UnknownSegment(source))?;
        if self.config.linker.insert_implied_key && insert_implied_key(segment) {
            log::debug!("Added implied key to segment {}", source);
        }

        let copy = segment.clone();
        let id = self.add_segment(copy);
        self.link_segments(source, id)?;
        Ok(id)
    }

    /// Rebuild a linked segment wholesale from the other copies
    pub fn refresh_segment(&mut self, id: SegmentId) -> Result<usize, ModelError> {
        let linker_id = self
            .segments
            .get(&id)
            .ok_or(ModelError::UnknownSegment(id))?
            .linker()
            .ok_or(ModelError::NotLinked(id))?;
        let linker = self
            .linkers
            .get(&linker_id)
            .ok_or(ModelError::UnknownLinker(linker_id))?;

        let copied = linker.refresh_segment(&mut self.segments, id, &self.config.linker)?;
        self.counters.increment(Counters::SEGMENT_REFRESHES);
        Ok(copied)
    }

    /// Entry point for the command layer after every edit: run one
    /// synchronization pass per linker. Returns the passes that did work.
    pub fn command_executed(&mut self) -> Vec<SyncReport> {
        let mut reports = Vec::new();
        for linker in self.linkers.values() {
            let report = linker.update_linked_segments(&mut self.segments, &self.config.linker);
            if report.source.is_some() {
                self.counters.increment(Counters::SYNC_PASSES);
                self.counters.add(Counters::EVENTS_PROPAGATED, report.events_copied as u64);
                reports.push(report);
            }
        }
        reports
    }
}
