//! Frame acquisition — both from LeapMotion hardware and mouse simulation.
//!
//! The public interface is [`FrameResult`] delivered over a `mpsc` channel.
//! Consumers don't need to know whether frames came from real hardware or the
//! pointer simulator.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use hand_frame::{FrameResult, Hand, Landmark, LANDMARKS_PER_HAND};

// ════════════════════════════════════════════════════════════════════════════
// FrameSource trait — unified interface for hw and sim
// ════════════════════════════════════════════════════════════════════════════

/// Anything that can deliver [`FrameResult`]s over a channel.
pub trait FrameSource: Send + 'static {
    fn run(self: Box<Self>, tx: Sender<FrameResult>);
}

// ════════════════════════════════════════════════════════════════════════════
// Spawn helper
// ════════════════════════════════════════════════════════════════════════════

/// Spawn a frame source on its own thread and return the receiving end.
pub fn spawn_frame_source<S: FrameSource>(source: S) -> Receiver<FrameResult> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || Box::new(source).run(tx));
    rx
}

// ════════════════════════════════════════════════════════════════════════════
// SimFrameSource — mouse simulation (always available)
// ════════════════════════════════════════════════════════════════════════════

/// Pointer snapshot from the window, in screen-normalized [0,1] coordinates
/// (x left → right, y top → bottom).  `present` is true while the button is
/// held — the synthetic hand exists only then.
#[derive(Clone, Copy, Debug)]
pub struct PointerState {
    pub x: f32,
    pub y: f32,
    pub present: bool,
}

/// Frame source driven by [`PointerState`] snapshots from the visualizer's
/// window.  Each snapshot becomes one frame: empty when the button is up,
/// one synthetic hand otherwise.  This decouples the window event loop from
/// frame synthesis.
pub struct SimFrameSource {
    pub rx: Receiver<PointerState>,
}

impl FrameSource for SimFrameSource {
    fn run(self: Box<Self>, tx: Sender<FrameResult>) {
        for pointer in self.rx {
            let frame = if pointer.present {
                FrameResult::single(synthetic_hand(pointer.x, pointer.y))
            } else {
                FrameResult::empty()
            };
            if tx.send(frame).is_err() {
                return;
            }
        }
    }
}

/// Build a plausible 21-landmark hand whose index fingertip sits exactly at
/// the given screen-normalized position, fingers pointing down toward the
/// key band and the wrist above.
///
/// Landmarks are stored in detector space, which the canvas mapper mirrors;
/// the x flip here compensates, so the index tip maps back onto the pointer
/// pixel.
pub fn synthetic_hand(sx: f32, sy: f32) -> Hand {
    // (base, tip) per digit in screen space, thumb → pinky.
    let wrist = (sx + 0.04, sy - 0.26);
    let digits: [((f32, f32), (f32, f32)); 5] = [
        ((sx - 0.07, sy - 0.18), (sx - 0.10, sy - 0.08)), // thumb, off to the side
        ((sx, sy - 0.16), (sx, sy)),                      // index: tip at the pointer
        ((sx + 0.03, sy - 0.16), (sx + 0.035, sy - 0.04)),
        ((sx + 0.06, sy - 0.17), (sx + 0.07, sy - 0.07)),
        ((sx + 0.09, sy - 0.18), (sx + 0.10, sy - 0.10)), // pinky, short
    ];

    let mut points: Vec<(f32, f32)> = Vec::with_capacity(LANDMARKS_PER_HAND);
    points.push(wrist);
    for (base, tip) in digits {
        // MCP, PIP, DIP, TIP along the digit
        for step in 0..4 {
            let t = step as f32 / 3.0;
            points.push((base.0 + (tip.0 - base.0) * t, base.1 + (tip.1 - base.1) * t));
        }
    }

    Hand::new(
        points
            .into_iter()
            .map(|(x, y)| Landmark::new(1.0 - x.clamp(0.0, 1.0), y.clamp(0.0, 1.0), 0.0))
            .collect(),
    )
}

// ════════════════════════════════════════════════════════════════════════════
// LeapFrameSource — real hardware (feature = "leap")
// ════════════════════════════════════════════════════════════════════════════

/// Frame source backed by a real LeapMotion controller.
///
/// Requires the `leap` feature flag and the LeapC shared library installed.
///
/// Each tracking frame's hands are converted to the 21-landmark layout:
/// wrist = palm position, then four joints per digit (knuckle → tip).
/// Positions are normalized against a fixed interaction box above the
/// device and pre-flipped so the mirrored canvas mapping shows the hand
/// where the user sees it.
#[cfg(feature = "leap")]
pub struct LeapFrameSource;

#[cfg(feature = "leap")]
impl FrameSource for LeapFrameSource {
    fn run(self: Box<Self>, tx: Sender<FrameResult>) {
        use leaprs::*;

        let mut connection = Connection::create(ConnectionConfig::default())
            .expect("Failed to open LeapC connection");
        connection.open().expect("Failed to open LeapMotion device");

        loop {
            let msg = match connection.poll(100) {
                Ok(m) => m,
                Err(_) => continue,
            };

            if let Event::Tracking(frame) = msg.event() {
                let hands = frame.hands().map(|h| convert_hand(&h)).collect();
                if tx.send(FrameResult { hands }).is_err() {
                    return;
                }
            }
        }
    }
}

/// Interaction box above the device, in mm.
#[cfg(feature = "leap")]
const BOX_X_HALF: f32 = 220.0;
#[cfg(feature = "leap")]
const BOX_Y_MIN: f32 = 80.0;
#[cfg(feature = "leap")]
const BOX_Y_MAX: f32 = 420.0;

#[cfg(feature = "leap")]
fn convert_hand(hand: &leaprs::Hand) -> Hand {
    // Leap y grows upward from the device; screen y grows downward, and the
    // canvas mapper mirrors x, so x is pre-flipped here.
    let norm = |px: f32, py: f32, pz: f32| -> Landmark {
        let x = (px / (2.0 * BOX_X_HALF) + 0.5).clamp(0.0, 1.0);
        let y = (1.0 - (py - BOX_Y_MIN) / (BOX_Y_MAX - BOX_Y_MIN)).clamp(0.0, 1.0);
        Landmark::new(1.0 - x, y, pz / 1000.0)
    };

    let mut landmarks = Vec::with_capacity(LANDMARKS_PER_HAND);
    let palm = hand.palm().position();
    landmarks.push(norm(palm.x, palm.y, palm.z));
    for digit in hand.digits() {
        let knuckle = digit.proximal().prev_joint();
        landmarks.push(norm(knuckle.x, knuckle.y, knuckle.z));
        let mid = digit.proximal().next_joint();
        landmarks.push(norm(mid.x, mid.y, mid.z));
        let upper = digit.intermediate().next_joint();
        landmarks.push(norm(upper.x, upper.y, upper.z));
        let tip = digit.distal().next_joint();
        landmarks.push(norm(tip.x, tip.y, tip.z));
    }
    Hand::new(landmarks)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use hand_frame::to_canvas;

    #[test]
    fn synthetic_hand_is_complete() {
        let hand = synthetic_hand(0.5, 0.8);
        assert!(hand.is_complete());
    }

    #[test]
    fn index_tip_maps_back_to_pointer() {
        let hand = synthetic_hand(0.3, 0.85);
        let tip = hand.landmarks()[8];
        let (x, y) = to_canvas(&tip, 640, 360);
        assert!((x - 0.3 * 640.0).abs() < 0.5);
        assert!((y - 0.85 * 360.0).abs() < 0.5);
    }

    #[test]
    fn other_fingertips_sit_above_the_index() {
        let hand = synthetic_hand(0.5, 0.9);
        let tips: Vec<_> = hand.fingertips().collect();
        let index_y = tips[1].1.y;
        for &(finger, lm) in &tips {
            if finger != 1 {
                assert!(lm.y < index_y, "finger {} below index tip", finger);
            }
        }
    }

    #[test]
    fn pointer_edges_stay_in_range() {
        for &(x, y) in &[(0.0, 0.0), (1.0, 1.0), (0.0, 1.0), (1.0, 0.0)] {
            for lm in synthetic_hand(x, y).landmarks() {
                assert!((0.0..=1.0).contains(&lm.x));
                assert!((0.0..=1.0).contains(&lm.y));
            }
        }
    }

    #[test]
    fn sim_source_translates_pointer_to_frames() {
        let (ptr_tx, ptr_rx) = mpsc::channel();
        let frame_rx = spawn_frame_source(SimFrameSource { rx: ptr_rx });

        ptr_tx
            .send(PointerState { x: 0.5, y: 0.8, present: true })
            .unwrap();
        let frame = frame_rx.recv().unwrap();
        assert_eq!(frame.hands.len(), 1);

        ptr_tx
            .send(PointerState { x: 0.5, y: 0.8, present: false })
            .unwrap();
        let frame = frame_rx.recv().unwrap();
        assert!(frame.is_empty());
    }
}
