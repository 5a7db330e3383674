use notation_core::models::event_types::{is_rest, note, rest};
use notation_core::{Segment, Time};

/// Helper to list (time, duration) of every event in a segment
fn extents(segment: &Segment) -> Vec<(Time, Time)> {
    segment.iter().map(|(k, e)| (k.time(), e.duration())).collect()
}

/// Events visited by the bounded iteration idiom
fn visit_to_end_marker(segment: &Segment) -> Vec<Time> {
    let mut visited = Vec::new();
    let mut cursor = segment.first_key();
    while let Some(key) = cursor {
        if !segment.is_before_end_marker(key) {
            break;
        }
        visited.push(key.time());
        cursor = segment.find_time(key.time() + 1);
    }
    visited
}

#[test]
fn test_extend_empty_segment_covers_range_with_rests() {
    let mut s = Segment::new(0, 0);
    s.set_end_marker_time(960);

    assert_eq!(s.end_marker_time(true), 960);
    let mut covered = 0;
    for (key, event) in s.iter() {
        assert!(is_rest(event));
        assert_eq!(key.time(), covered);
        covered += event.duration();
    }
    assert_eq!(covered, 960);
}

#[test]
fn test_extend_after_notes_fills_only_the_tail() {
    let mut s = Segment::new(0, 0);
    s.insert(note(0, 480, 60));
    s.set_end_time(1920);

    assert_eq!(extents(&s), vec![(0, 480), (480, 1440)]);
    assert_eq!(s.end_time(), 1920);
    assert_eq!(s.end_marker_time(true), 1920);
}

#[test]
fn test_shrinking_end_time_keeps_straddling_event_whole() {
    let mut s = Segment::new(0, 0);
    s.insert(note(0, 240, 60));
    s.insert(note(240, 480, 62));
    s.insert(note(720, 240, 64));
    s.insert(rest(960, 960));

    s.set_end_time(480);
    assert_eq!(extents(&s), vec![(0, 240), (240, 480)]);
    assert_eq!(s.end_marker_time(true), 480);
    assert_eq!(s.end_time(), 720);
}

#[test]
fn test_shrinking_marker_only_moves_marker() {
    let mut s = Segment::new(0, 0);
    s.insert(note(0, 480, 60));
    s.insert(note(480, 480, 62));
    s.set_end_marker_time(240);

    assert_eq!(s.len(), 2);
    assert_eq!(s.end_marker_time(false), 240);
    assert_eq!(s.end_time(), 960);

    s.clear_end_marker();
    assert_eq!(s.end_marker_time(false), 960);
}

#[test]
fn test_marker_cannot_precede_start() {
    let mut s = Segment::new(0, 960);
    s.set_end_marker_time(0);
    assert_eq!(s.end_marker_time(false), 960);
}

#[test]
fn test_bounded_iteration_visits_events_before_marker() {
    let mut s = Segment::new(0, 0);
    for i in 0..4 {
        s.insert(note(i * 240, 240, 60 + i));
    }
    s.set_end_marker_time(600);

    assert_eq!(visit_to_end_marker(&s), vec![0, 240, 480]);
    let idiom: Vec<Time> = s.iter_to_end_marker().map(|(k, _)| k.time()).collect();
    assert_eq!(idiom, vec![0, 240, 480]);
}

#[test]
fn test_bounded_iteration_terminates_on_empty_segment() {
    let s = Segment::new(0, 0);
    assert!(visit_to_end_marker(&s).is_empty());
    assert_eq!(s.iter_to_end_marker().count(), 0);
}

#[test]
fn test_time_slice_and_lookup() {
    let mut s = Segment::new(0, 0);
    s.insert(note(480, 240, 60));
    s.insert(note(480, 240, 64));
    s.insert(note(960, 240, 67));

    assert_eq!(s.time_slice(480).count(), 2);
    assert_eq!(s.time_slice(500).count(), 0);
    assert_eq!(s.find_nearest_time(700).map(|k| k.time()), Some(480));
    assert_eq!(s.find_nearest_time(100), None);

    let single = note(960, 240, 67);
    assert!(s.find_single(&single).is_some());
    assert!(s.erase_single(&single));
    assert!(!s.erase_single(&single));
    assert_eq!(s.erase_time_range(0, 10_000), 2);
    assert!(s.is_empty());
}
