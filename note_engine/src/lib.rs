//! # note_engine
//!
//! The note state machine: one evaluation per delivered frame, mapping
//! fingertip positions to a *requested set* of notes, then diffing that set
//! against the notes currently sounding.
//!
//! Per-note lifecycle is `silent → sounding → silent` with no timers: a note
//! attacks on the first frame a fingertip enters its zone, holds (without
//! re-attacking) while the fingertip stays, and releases the moment no
//! fingertip claims it.  A frame with zero hands therefore releases
//! everything — that is the designed failure mode, never an error.
//!
//! Audio is a fire-and-forget [`NoteSink`]; the tracker also returns
//! [`NoteChange`] events so a presentation layer can mirror key highlights
//! without reaching into tracker state.

use std::collections::BTreeSet;

use hand_frame::{to_canvas, FrameResult};
use key_layout::{KeyZone, NoteId};

// ════════════════════════════════════════════════════════════════════════════
// NoteSink — audio collaborator interface
// ════════════════════════════════════════════════════════════════════════════

/// Anything that can start and stop a sounding note.
///
/// Calls are fire-and-forget: implementations must not fail loudly, and the
/// tracker never observes a return value.
pub trait NoteSink {
    fn note_on(&mut self, note: &NoteId);
    fn note_off(&mut self, note: &NoteId);
}

// ════════════════════════════════════════════════════════════════════════════
// NoteChange — presentation events
// ════════════════════════════════════════════════════════════════════════════

/// Activation edge emitted alongside the audio command, for key highlighting
/// and status display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NoteChange {
    Activated(NoteId),
    Deactivated(NoteId),
}

// ════════════════════════════════════════════════════════════════════════════
// Requested set
// ════════════════════════════════════════════════════════════════════════════

/// Compute the set of notes implied by this frame's fingertip positions.
///
/// Each fingertip of each complete hand is mapped to canvas pixels and
/// tested against the zones in order; the first containing zone claims the
/// fingertip (so zone order is the overlap priority, and a fingertip can
/// claim at most one note).  Hands without a full 21-point skeleton are
/// dropped here rather than risking an out-of-range joint index.
///
/// The result is a set: several fingertips landing on one note collapse to
/// a single entry, which is what suppresses duplicate attacks.
pub fn requested_set(
    frame: &FrameResult,
    zones: &[KeyZone],
    width: usize,
    height: usize,
) -> BTreeSet<NoteId> {
    let mut requested = BTreeSet::new();
    for hand in &frame.hands {
        if !hand.is_complete() {
            continue;
        }
        for (_finger, tip) in hand.fingertips() {
            let (px, py) = to_canvas(&tip, width, height);
            if let Some(zone) = zones.iter().find(|z| z.rect.contains(px, py)) {
                requested.insert(zone.note.clone());
            }
        }
    }
    requested
}

// ════════════════════════════════════════════════════════════════════════════
// NoteTracker
// ════════════════════════════════════════════════════════════════════════════

/// Owner of the active-note set.
///
/// The set is mutated only by [`process_frame`](NoteTracker::process_frame)
/// and the manual [`press`](NoteTracker::press) /
/// [`release`](NoteTracker::release) /
/// [`release_all`](NoteTracker::release_all) operations, all of which write
/// through the same state so the frame-driven and manual paths can never
/// disagree about what is sounding.
#[derive(Debug, Default)]
pub struct NoteTracker {
    active: BTreeSet<NoteId>,
}

impl NoteTracker {
    pub fn new() -> Self {
        NoteTracker::default()
    }

    /// Notes currently commanded sounding.
    pub fn active(&self) -> &BTreeSet<NoteId> {
        &self.active
    }

    pub fn is_active(&self, note: &NoteId) -> bool {
        self.active.contains(note)
    }

    /// Evaluate one frame: compute the requested set, emit releases for
    /// notes that lost their fingertip and attacks for newly claimed ones.
    /// Notes present in both sets are left alone — no re-trigger while held.
    pub fn process_frame(
        &mut self,
        frame: &FrameResult,
        zones: &[KeyZone],
        width: usize,
        height: usize,
        sink: &mut dyn NoteSink,
    ) -> Vec<NoteChange> {
        let requested = requested_set(frame, zones, width, height);
        self.apply(requested, sink)
    }

    fn apply(&mut self, requested: BTreeSet<NoteId>, sink: &mut dyn NoteSink) -> Vec<NoteChange> {
        let mut changes = Vec::new();
        // Releases first, mirroring evaluation order in the frame loop.
        for note in self.active.difference(&requested) {
            sink.note_off(note);
            changes.push(NoteChange::Deactivated(note.clone()));
        }
        for note in requested.difference(&self.active) {
            sink.note_on(note);
            changes.push(NoteChange::Activated(note.clone()));
        }
        self.active = requested;
        changes
    }

    /// Manual trigger path: begin sounding `note` now, bypassing hit-testing
    /// but writing through the shared active set.  Returns true when the
    /// note was newly activated.
    pub fn press(&mut self, note: &NoteId, sink: &mut dyn NoteSink) -> bool {
        if self.active.contains(note) {
            return false;
        }
        sink.note_on(note);
        self.active.insert(note.clone());
        true
    }

    /// Manual trigger path: stop sounding `note`.  Returns true when the
    /// note was actually sounding.
    pub fn release(&mut self, note: &NoteId, sink: &mut dyn NoteSink) -> bool {
        if !self.active.remove(note) {
            return false;
        }
        sink.note_off(note);
        true
    }

    /// Session teardown: release everything still sounding.  Reachable from
    /// outside the per-frame loop so shutdown can't leave stuck notes.
    pub fn release_all(&mut self, sink: &mut dyn NoteSink) {
        for note in std::mem::take(&mut self.active) {
            sink.note_off(&note);
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use hand_frame::{Hand, Landmark, LANDMARKS_PER_HAND};
    use key_layout::{KeyboardLayout, LayoutAnchor, NoteId};

    const W: usize = 640;
    const H: usize = 360;

    #[derive(Debug, Default)]
    struct RecordingSink {
        ons: Vec<NoteId>,
        offs: Vec<NoteId>,
    }

    impl NoteSink for RecordingSink {
        fn note_on(&mut self, note: &NoteId) {
            self.ons.push(note.clone());
        }
        fn note_off(&mut self, note: &NoteId) {
            self.offs.push(note.clone());
        }
    }

    /// Eight evenly spaced naturals C4..C5, no accidentals — the worked
    /// example layout (zone width 80, band y ∈ [252, 360] on 640×360).
    fn naturals_only() -> Vec<KeyZone> {
        let layout = KeyboardLayout {
            naturals: ["C4", "D4", "E4", "F4", "G4", "A4", "B4", "C5"]
                .iter()
                .map(|&n| NoteId::new(n))
                .collect(),
            accidentals: vec![],
            anchor: LayoutAnchor::default(),
        };
        layout.zones(W, H)
    }

    /// A complete hand parked out of the key band, with the index fingertip
    /// moved to the given normalized position.
    fn hand_with_index_at(x: f32, y: f32) -> Hand {
        let mut lms = vec![Landmark::new(0.5, 0.1, 0.0); LANDMARKS_PER_HAND];
        lms[8] = Landmark::new(x, y, 0.0);
        Hand::new(lms)
    }

    fn frame(hands: Vec<Hand>) -> FrameResult {
        FrameResult { hands }
    }

    #[test]
    fn end_to_end_attack_hold_release() {
        // (0.9, 0.8) mirrors to pixel (64, 288): inside C4's zone [0, 80].
        let zones = naturals_only();
        let mut tracker = NoteTracker::new();
        let mut sink = RecordingSink::default();
        let touching = frame(vec![hand_with_index_at(0.9, 0.8)]);

        let changes = tracker.process_frame(&touching, &zones, W, H, &mut sink);
        assert_eq!(changes, vec![NoteChange::Activated(NoteId::new("C4"))]);
        assert_eq!(sink.ons, vec![NoteId::new("C4")]);

        // Held across frames: no further calls.
        for _ in 0..3 {
            let changes = tracker.process_frame(&touching, &zones, W, H, &mut sink);
            assert!(changes.is_empty());
        }
        assert_eq!(sink.ons.len(), 1);
        assert!(sink.offs.is_empty());

        // Hand gone: exactly one release.
        let changes = tracker.process_frame(&FrameResult::empty(), &zones, W, H, &mut sink);
        assert_eq!(changes, vec![NoteChange::Deactivated(NoteId::new("C4"))]);
        assert_eq!(sink.offs, vec![NoteId::new("C4")]);
        assert!(tracker.active().is_empty());
    }

    #[test]
    fn empty_frame_releases_all_active() {
        let zones = naturals_only();
        let mut tracker = NoteTracker::new();
        let mut sink = RecordingSink::default();

        // Two fingertips on different keys: index on C4, middle on E4.
        let mut lms = vec![Landmark::new(0.5, 0.1, 0.0); LANDMARKS_PER_HAND];
        lms[8] = Landmark::new(0.9, 0.8, 0.0); // → px 64, C4
        lms[12] = Landmark::new(0.7, 0.8, 0.0); // → px 192, E4
        tracker.process_frame(&frame(vec![Hand::new(lms)]), &zones, W, H, &mut sink);
        assert_eq!(tracker.active().len(), 2);

        tracker.process_frame(&FrameResult::empty(), &zones, W, H, &mut sink);
        assert_eq!(sink.offs.len(), 2);
        assert!(sink.offs.contains(&NoteId::new("C4")));
        assert!(sink.offs.contains(&NoteId::new("E4")));
        assert!(tracker.active().is_empty());
    }

    #[test]
    fn first_zone_wins_for_overlapping_zones() {
        // Default octave: C#4's zone [56, 104]×[252, 316.8] overlaps C4 and
        // D4.  A fingertip at pixel (64, 288) must claim C#4, listed first.
        let zones = KeyboardLayout::default_octave().zones(W, H);
        let requested = requested_set(
            &frame(vec![hand_with_index_at(0.9, 0.8)]),
            &zones,
            W,
            H,
        );
        assert_eq!(requested.len(), 1);
        assert!(requested.contains(&NoteId::new("C#4")));
    }

    #[test]
    fn two_fingertips_same_note_single_attack() {
        let zones = naturals_only();
        let mut tracker = NoteTracker::new();
        let mut sink = RecordingSink::default();

        // Two hands, both index tips inside C4.
        let hands = vec![
            hand_with_index_at(0.95, 0.8),
            hand_with_index_at(0.92, 0.9),
        ];
        tracker.process_frame(&frame(hands), &zones, W, H, &mut sink);
        assert_eq!(sink.ons, vec![NoteId::new("C4")]);
    }

    #[test]
    fn malformed_hand_is_skipped() {
        let zones = naturals_only();
        let mut tracker = NoteTracker::new();
        let mut sink = RecordingSink::default();

        // Truncated hand pointing at C4 — must not play.
        let stub = Hand::new(vec![Landmark::new(0.9, 0.8, 0.0); 9]);
        tracker.process_frame(&frame(vec![stub]), &zones, W, H, &mut sink);
        assert!(sink.ons.is_empty());

        // A malformed hand next to a complete one leaves the complete one
        // fully functional.
        let stub = Hand::new(vec![Landmark::new(0.9, 0.8, 0.0); 9]);
        let good = hand_with_index_at(0.7, 0.8); // E4
        tracker.process_frame(&frame(vec![stub, good]), &zones, W, H, &mut sink);
        assert_eq!(sink.ons, vec![NoteId::new("E4")]);
    }

    #[test]
    fn manual_press_shares_state_with_frame_path() {
        let zones = naturals_only();
        let mut tracker = NoteTracker::new();
        let mut sink = RecordingSink::default();

        assert!(tracker.press(&NoteId::new("C4"), &mut sink));
        assert!(!tracker.press(&NoteId::new("C4"), &mut sink));
        assert_eq!(sink.ons.len(), 1);

        // A frame whose fingertip holds C4 does not re-attack it.
        let touching = frame(vec![hand_with_index_at(0.9, 0.8)]);
        let changes = tracker.process_frame(&touching, &zones, W, H, &mut sink);
        assert!(changes.is_empty());
        assert_eq!(sink.ons.len(), 1);
    }

    #[test]
    fn manual_release() {
        let mut tracker = NoteTracker::new();
        let mut sink = RecordingSink::default();
        let c4 = NoteId::new("C4");

        assert!(!tracker.release(&c4, &mut sink)); // not sounding: no-op
        tracker.press(&c4, &mut sink);
        assert!(tracker.release(&c4, &mut sink));
        assert_eq!(sink.offs, vec![c4]);
        assert!(tracker.active().is_empty());
    }

    #[test]
    fn release_all_flushes_every_note() {
        let mut tracker = NoteTracker::new();
        let mut sink = RecordingSink::default();
        for n in ["C4", "E4", "G4"] {
            tracker.press(&NoteId::new(n), &mut sink);
        }
        tracker.release_all(&mut sink);
        assert_eq!(sink.offs.len(), 3);
        assert!(tracker.active().is_empty());
    }

    #[test]
    fn moving_between_keys_releases_and_attacks() {
        let zones = naturals_only();
        let mut tracker = NoteTracker::new();
        let mut sink = RecordingSink::default();

        tracker.process_frame(
            &frame(vec![hand_with_index_at(0.9, 0.8)]), // C4
            &zones,
            W,
            H,
            &mut sink,
        );
        let changes = tracker.process_frame(
            &frame(vec![hand_with_index_at(0.7, 0.8)]), // E4
            &zones,
            W,
            H,
            &mut sink,
        );
        assert_eq!(
            changes,
            vec![
                NoteChange::Deactivated(NoteId::new("C4")),
                NoteChange::Activated(NoteId::new("E4")),
            ]
        );
    }
}
