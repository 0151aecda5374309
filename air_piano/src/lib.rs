//! # air_piano
//!
//! Play a piano in the air: per-frame hand-skeleton landmarks are mapped onto
//! rectangular key zones, producing note on/off events and a mirrored visual
//! overlay at interactive frame rate.
//!
//! ## Pipeline (once per delivered frame)
//!
//! | Stage | Crate |
//! |---|---|
//! | Frame source (sim or LeapMotion) | `air_piano::source` |
//! | Mirrored landmark → pixel mapping | `hand_frame` |
//! | Key-zone layout (recomputed on resize) | `key_layout` |
//! | Requested-set / active-set diff → note on/off | `note_engine` |
//! | Trail layer, zones, skeleton, brush strokes | `air_piano::visualizer` |
//!
//! ## Feature flags
//!
//! * (default) — **Simulation mode**: the mouse drives a synthetic hand; the
//!   index fingertip follows the cursor while the left button is held.
//! * `leap` — **Hardware mode**: polls a real LeapMotion controller via LeapC
//!   and converts its digit joints to the 21-landmark layout.
//!
//! ### Window controls
//!
//! | Input | Action |
//! |---|---|
//! | hold left mouse button | synthetic hand, index tip at cursor |
//! | `A S D F G H J K` | play naturals directly (press/release) |
//! | `W E T Y U` | play accidentals directly |
//! | `1` | toggle skeleton overlay |
//! | `2` | toggle artistic brush mode |
//! | `Q` | quit (releases all sounding notes) |

pub mod app;
pub mod audio;
pub mod source;
pub mod visualizer;
