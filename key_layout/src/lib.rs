//! # key_layout
//!
//! Static piano key definitions and the layout engine that turns them into
//! rectangular hit zones in canvas pixel space.
//!
//! A [`KeyboardLayout`] is pure data: an ordered list of natural keys, a list
//! of accidentals with per-key horizontal centers, and a vertical anchor.
//! [`KeyboardLayout::zones`] derives the pixel rectangles for a given canvas
//! size — a deterministic pure function, recomputed by the caller whenever
//! the canvas dimensions change.
//!
//! Layouts can be loaded from a RON file, so alternative keyboards (more
//! octaves, different anchors) are a data change, not a code change:
//!
//! ```ron
//! (
//!     naturals: ["C4", "D4", "E4", "F4", "G4", "A4", "B4", "C5"],
//!     accidentals: [
//!         (note: "C#4", center: 0.125),
//!         (note: "D#4", center: 0.25),
//!         (note: "F#4", center: 0.5),
//!         (note: "G#4", center: 0.625),
//!         (note: "A#4", center: 0.75),
//!     ],
//!     anchor: Bottom(band_frac: 0.3),
//! )
//! ```

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════════════════
// NoteId
// ════════════════════════════════════════════════════════════════════════════

/// A note identifier such as `"C4"` or `"F#4"`.
///
/// The layout and state machine treat note ids as opaque keys; only the MIDI
/// sink interprets the pitch-class/octave structure.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    pub fn new(name: impl Into<String>) -> Self {
        NoteId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(s: &str) -> Self {
        NoteId::new(s)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Rect
// ════════════════════════════════════════════════════════════════════════════

/// Axis-aligned rectangle in canvas pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    /// Point membership, inclusive on all four edges.
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.x + self.w && py >= self.y && py <= self.y + self.h
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Key definitions
// ════════════════════════════════════════════════════════════════════════════

/// An accidental (sharp/flat) key definition.
///
/// `center` is the horizontal center of the key as a fraction of the canvas
/// width.  The zone is centered on it: left edge = `center·width − w/2`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccidentalDef {
    pub note: NoteId,
    pub center: f32,
}

/// Vertical placement of the key band.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum LayoutAnchor {
    /// Band flush with the canvas bottom, `band_frac` of the canvas tall.
    Bottom { band_frac: f32 },
    /// Band starting `start_frac` down from the top.
    Top { start_frac: f32, band_frac: f32 },
}

impl Default for LayoutAnchor {
    fn default() -> Self {
        LayoutAnchor::Bottom { band_frac: 0.30 }
    }
}

impl LayoutAnchor {
    /// The near-top preset: band starts 10% down the canvas.
    pub fn near_top() -> Self {
        LayoutAnchor::Top { start_frac: 0.10, band_frac: 0.30 }
    }

    fn band_frac(&self) -> f32 {
        match *self {
            LayoutAnchor::Bottom { band_frac } => band_frac,
            LayoutAnchor::Top { band_frac, .. } => band_frac,
        }
    }

    /// `(top, height)` of the key band for a canvas of the given height.
    fn band(&self, canvas_h: f32) -> (f32, f32) {
        match *self {
            LayoutAnchor::Bottom { band_frac } => {
                let h = canvas_h * band_frac;
                (canvas_h - h, h)
            }
            LayoutAnchor::Top { start_frac, band_frac } => {
                (canvas_h * start_frac, canvas_h * band_frac)
            }
        }
    }
}

/// Accidental keys are 0.6× a natural key in width and 0.6× the band in
/// height.
const ACCIDENTAL_WIDTH_RATIO: f32 = 0.6;
const ACCIDENTAL_HEIGHT_RATIO: f32 = 0.6;

// ════════════════════════════════════════════════════════════════════════════
// KeyZone
// ════════════════════════════════════════════════════════════════════════════

/// One musical note's rectangular hit region.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyZone {
    pub note: NoteId,
    pub rect: Rect,
    pub accidental: bool,
}

// ════════════════════════════════════════════════════════════════════════════
// KeyboardLayout
// ════════════════════════════════════════════════════════════════════════════

/// The full static keyboard definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyboardLayout {
    /// Natural ("white") keys in pitch order, left → right.
    pub naturals: Vec<NoteId>,
    /// Accidental ("black") keys with horizontal centers.
    pub accidentals: Vec<AccidentalDef>,
    #[serde(default)]
    pub anchor: LayoutAnchor,
}

impl Default for KeyboardLayout {
    fn default() -> Self {
        KeyboardLayout::default_octave()
    }
}

impl KeyboardLayout {
    /// The built-in single octave C4..C5: eight naturals with the five
    /// accidentals centered on the natural-key boundaries after C, D, F, G
    /// and A.
    pub fn default_octave() -> Self {
        let naturals = ["C4", "D4", "E4", "F4", "G4", "A4", "B4", "C5"]
            .iter()
            .map(|&n| NoteId::new(n))
            .collect::<Vec<_>>();
        let count = naturals.len() as f32;
        let accidentals = [("C#4", 1.0), ("D#4", 2.0), ("F#4", 4.0), ("G#4", 5.0), ("A#4", 6.0)]
            .iter()
            .map(|&(n, boundary)| AccidentalDef {
                note: NoteId::new(n),
                center: boundary / count,
            })
            .collect();
        KeyboardLayout {
            naturals,
            accidentals,
            anchor: LayoutAnchor::default(),
        }
    }

    /// Parse and validate a layout from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self, LayoutError> {
        let layout: KeyboardLayout = ron::from_str(text)?;
        layout.validate()?;
        Ok(layout)
    }

    /// Load and validate a layout from a RON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LayoutError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.naturals.is_empty() {
            return Err(LayoutError::NoNaturals);
        }
        let band = self.anchor.band_frac();
        if !(band > 0.0 && band <= 1.0) {
            return Err(LayoutError::BadBandFraction(band));
        }
        for acc in &self.accidentals {
            if !(acc.center > 0.0 && acc.center < 1.0) {
                return Err(LayoutError::CenterOutOfRange(acc.note.clone(), acc.center));
            }
        }
        let mut seen = std::collections::BTreeSet::new();
        for note in self.naturals.iter().chain(self.accidentals.iter().map(|a| &a.note)) {
            if !seen.insert(note) {
                return Err(LayoutError::DuplicateNote(note.clone()));
            }
        }
        Ok(())
    }

    /// Derive the key zones for a canvas of the given pixel size.
    ///
    /// Accidental zones come first in the returned order: hit-testing takes
    /// the first containing zone, and the narrower accidentals sit on top of
    /// the naturals they overlap.  This ordering is the declared overlap
    /// priority, not an accident of construction.
    pub fn zones(&self, width: usize, height: usize) -> Vec<KeyZone> {
        let w = width as f32;
        let (band_y, band_h) = self.anchor.band(height as f32);
        let natural_w = w / self.naturals.len() as f32;
        let acc_w = natural_w * ACCIDENTAL_WIDTH_RATIO;
        let acc_h = band_h * ACCIDENTAL_HEIGHT_RATIO;

        let mut zones = Vec::with_capacity(self.accidentals.len() + self.naturals.len());
        for acc in &self.accidentals {
            zones.push(KeyZone {
                note: acc.note.clone(),
                rect: Rect {
                    x: acc.center * w - acc_w / 2.0,
                    y: band_y,
                    w: acc_w,
                    h: acc_h,
                },
                accidental: true,
            });
        }
        for (i, note) in self.naturals.iter().enumerate() {
            zones.push(KeyZone {
                note: note.clone(),
                rect: Rect {
                    x: i as f32 * natural_w,
                    y: band_y,
                    w: natural_w,
                    h: band_h,
                },
                accidental: false,
            });
        }
        zones
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Errors
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("failed to read layout file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse layout: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("layout needs at least one natural key")]
    NoNaturals,

    #[error("band fraction {0} outside (0, 1]")]
    BadBandFraction(f32),

    #[error("accidental {0} center {1} outside (0, 1)")]
    CenterOutOfRange(NoteId, f32),

    #[error("duplicate note name {0}")]
    DuplicateNote(NoteId),
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zones_are_idempotent() {
        let layout = KeyboardLayout::default_octave();
        assert_eq!(layout.zones(640, 360), layout.zones(640, 360));
    }

    #[test]
    fn default_octave_band_geometry() {
        // 640×360, band_frac 0.30: band y ∈ [252, 360], natural width 80.
        let zones = KeyboardLayout::default_octave().zones(640, 360);
        let c4 = zones.iter().find(|z| z.note.as_str() == "C4").unwrap();
        assert_eq!(c4.rect, Rect { x: 0.0, y: 252.0, w: 80.0, h: 108.0 });
        let c5 = zones.iter().find(|z| z.note.as_str() == "C5").unwrap();
        assert_eq!(c5.rect.x, 560.0);
    }

    #[test]
    fn accidentals_precede_naturals() {
        let zones = KeyboardLayout::default_octave().zones(640, 360);
        let first_natural = zones.iter().position(|z| !z.accidental).unwrap();
        assert!(zones[..first_natural].iter().all(|z| z.accidental));
        assert_eq!(first_natural, 5);
    }

    #[test]
    fn accidental_center_alignment() {
        // C#4 centers on the C4/D4 boundary (x = 80); width 0.6·80 = 48.
        let zones = KeyboardLayout::default_octave().zones(640, 360);
        let cs4 = zones.iter().find(|z| z.note.as_str() == "C#4").unwrap();
        assert!((cs4.rect.x - (80.0 - 24.0)).abs() < 1e-3);
        assert!((cs4.rect.w - 48.0).abs() < 1e-3);
        assert!((cs4.rect.h - 64.8).abs() < 1e-3);
    }

    #[test]
    fn near_top_anchor() {
        let mut layout = KeyboardLayout::default_octave();
        layout.anchor = LayoutAnchor::near_top();
        let zones = layout.zones(640, 360);
        let c4 = zones.iter().find(|z| z.note.as_str() == "C4").unwrap();
        assert_eq!(c4.rect.y, 36.0);
        assert_eq!(c4.rect.h, 108.0);
    }

    #[test]
    fn rect_edges_inclusive() {
        let r = Rect { x: 0.0, y: 252.0, w: 80.0, h: 108.0 };
        assert!(r.contains(0.0, 252.0));
        assert!(r.contains(80.0, 360.0));
        assert!(!r.contains(80.01, 300.0));
        assert!(!r.contains(40.0, 251.9));
    }

    #[test]
    fn ron_round_trip() {
        let layout = KeyboardLayout::default_octave();
        let text = ron::to_string(&layout).unwrap();
        let back = KeyboardLayout::from_ron_str(&text).unwrap();
        assert_eq!(layout, back);
    }

    #[test]
    fn ron_anchor_defaults_to_bottom() {
        let text = r#"(
            naturals: ["C4", "D4"],
            accidentals: [(note: "C#4", center: 0.5)],
        )"#;
        let layout = KeyboardLayout::from_ron_str(text).unwrap();
        assert_eq!(layout.anchor, LayoutAnchor::Bottom { band_frac: 0.30 });
    }

    #[test]
    fn validation_rejects_empty_naturals() {
        let layout = KeyboardLayout {
            naturals: vec![],
            accidentals: vec![],
            anchor: LayoutAnchor::default(),
        };
        assert!(matches!(layout.validate(), Err(LayoutError::NoNaturals)));
    }

    #[test]
    fn validation_rejects_offscreen_accidental() {
        let mut layout = KeyboardLayout::default_octave();
        layout.accidentals[0].center = 1.5;
        assert!(matches!(
            layout.validate(),
            Err(LayoutError::CenterOutOfRange(_, _))
        ));
    }

    #[test]
    fn validation_rejects_duplicate_note() {
        let mut layout = KeyboardLayout::default_octave();
        layout.naturals.push(NoteId::new("C4"));
        assert!(matches!(layout.validate(), Err(LayoutError::DuplicateNote(_))));
    }
}
