//! Software-rendered overlay using `minifb`.
//!
//! Layout (mirrored view):
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │ status bar / key legend                             │
//! │                                                     │
//! │        [fading brush trails]    [hand skeleton]     │
//! │                                                     │
//! │ ┌──┐▌▌┌──┐┌──┐▌▌┌──┐▌▌┌──┐▌▌┌──┐  ← key band        │
//! │ └──┘  └──┘└──┘  └──┘  └──┘  └──┘                    │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! Two pixel layers: a persistent **trail** buffer that is washed toward the
//! background a little each frame (so brush strokes decay instead of
//! vanishing), and the composed frame buffer everything else is drawn into.
//! All hand geometry goes through [`hand_frame::to_canvas`] — the same
//! mapping hit-testing uses, so what is drawn is what plays.

use std::collections::BTreeSet;
use std::sync::mpsc::Sender;

use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};
use rand::Rng;

use hand_frame::{to_canvas, FrameResult, SKELETON_EDGES};
use key_layout::{KeyZone, NoteId};

use crate::source::PointerState;

// ════════════════════════════════════════════════════════════════════════════
// Layout constants
// ════════════════════════════════════════════════════════════════════════════

pub const WIN_W: usize = 960;
pub const WIN_H: usize = 540;

const BG_COLOR: u32 = 0xFF1A1A2E;
const BAR_BG: u32 = 0xFF0F3460;
const NATURAL_FILL: u32 = 0xFFF5F5F0;
const ACCIDENTAL_FILL: u32 = 0xFF16213E;
const ZONE_BORDER: u32 = 0xFF000000;
const HIGHLIGHT_COLOR: u32 = 0xFFFFD700; // gold — active key wash
const DOT_COLOR: u32 = 0xFFFF4D4D;
const BONE_COLOR: u32 = 0xFFAADDFF;

/// Fraction of the wash applied to the trail layer each frame.
const TRAIL_FADE: f32 = 0.05;

/// Brush radius jitter: ±20% of the base size.
const BRUSH_JITTER: std::ops::Range<f32> = 0.8..1.2;

struct Brush {
    color: u32,
    size: f32,
    opacity: f32,
}

/// Fixed palette, cycled by fingertip index (thumb → pinky).
const BRUSHES: [Brush; 5] = [
    Brush { color: 0xFFFF7675, size: 15.0, opacity: 0.6 },
    Brush { color: 0xFF74B9FF, size: 20.0, opacity: 0.5 },
    Brush { color: 0xFF55EFC4, size: 25.0, opacity: 0.4 },
    Brush { color: 0xFFFFEAA7, size: 18.0, opacity: 0.5 },
    Brush { color: 0xFFA29BFE, size: 22.0, opacity: 0.5 },
];

/// Direct-play key rows (manual trigger path): indices into the layout's
/// natural and accidental lists.
pub const NATURAL_KEYS: [Key; 8] = [
    Key::A, Key::S, Key::D, Key::F, Key::G, Key::H, Key::J, Key::K,
];
pub const ACCIDENTAL_KEYS: [Key; 5] = [Key::W, Key::E, Key::T, Key::Y, Key::U];

// ════════════════════════════════════════════════════════════════════════════
// WindowInput
// ════════════════════════════════════════════════════════════════════════════

/// Everything the window reported this frame, apart from the pointer (which
/// goes straight to the simulation source).
#[derive(Debug, Default)]
pub struct WindowInput {
    pub quit: bool,
    pub toggle_skeleton: bool,
    pub toggle_artistic: bool,
    /// Natural-key indices pressed / released this frame.
    pub natural_down: Vec<usize>,
    pub natural_up: Vec<usize>,
    /// Accidental-key indices pressed / released this frame.
    pub accidental_down: Vec<usize>,
    pub accidental_up: Vec<usize>,
}

// ════════════════════════════════════════════════════════════════════════════
// Visualizer
// ════════════════════════════════════════════════════════════════════════════

pub struct Visualizer {
    window: Window,
    buf: Vec<u32>,
    trail: Vec<u32>,
    width: usize,
    height: usize,
    pointer_tx: Sender<PointerState>,
    rng: rand::rngs::ThreadRng,
}

impl Visualizer {
    pub fn new(pointer_tx: Sender<PointerState>) -> Result<Self, String> {
        let mut window = Window::new(
            "Air Piano — play with your hands",
            WIN_W,
            WIN_H,
            WindowOptions {
                resize: true,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| e.to_string())?;

        window.set_target_fps(60);

        Ok(Visualizer {
            window,
            buf: vec![BG_COLOR; WIN_W * WIN_H],
            trail: vec![BG_COLOR; WIN_W * WIN_H],
            width: WIN_W,
            height: WIN_H,
            pointer_tx,
            rng: rand::rng(),
        })
    }

    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Pick up a window resize.  Returns true when the canvas dimensions
    /// changed — the caller must recompute key zones before evaluating the
    /// next frame against them.
    pub fn refresh_size(&mut self) -> bool {
        let (w, h) = self.window.get_size();
        if w == self.width && h == self.height || w == 0 || h == 0 {
            return false;
        }
        self.width = w;
        self.height = h;
        self.buf = vec![BG_COLOR; w * h];
        self.trail = vec![BG_COLOR; w * h];
        true
    }

    /// Poll keyboard and pointer.  Pointer state is forwarded to the
    /// simulation source; everything else is returned for the app to route.
    pub fn poll_input(&mut self) -> WindowInput {
        let mut input = WindowInput::default();
        if !self.window.is_open() {
            input.quit = true;
            return input;
        }

        if self.window.is_key_pressed(Key::Q, KeyRepeat::No) {
            input.quit = true;
        }
        if self.window.is_key_pressed(Key::Key1, KeyRepeat::No) {
            input.toggle_skeleton = true;
        }
        if self.window.is_key_pressed(Key::Key2, KeyRepeat::No) {
            input.toggle_artistic = true;
        }

        for (i, &k) in NATURAL_KEYS.iter().enumerate() {
            if self.window.is_key_pressed(k, KeyRepeat::No) {
                input.natural_down.push(i);
            }
            if self.window.is_key_released(k) {
                input.natural_up.push(i);
            }
        }
        for (i, &k) in ACCIDENTAL_KEYS.iter().enumerate() {
            if self.window.is_key_pressed(k, KeyRepeat::No) {
                input.accidental_down.push(i);
            }
            if self.window.is_key_released(k) {
                input.accidental_up.push(i);
            }
        }

        let present = self.window.get_mouse_down(MouseButton::Left);
        let pointer = match self.window.get_mouse_pos(MouseMode::Clamp) {
            Some((mx, my)) => PointerState {
                x: (mx / self.width as f32).clamp(0.0, 1.0),
                y: (my / self.height as f32).clamp(0.0, 1.0),
                present,
            },
            None => PointerState { x: 0.5, y: 0.5, present: false },
        };
        let _ = self.pointer_tx.send(pointer);

        input
    }

    /// Render one frame.
    pub fn render(
        &mut self,
        zones: &[KeyZone],
        active: &BTreeSet<NoteId>,
        frame: &FrameResult,
        show_skeleton: bool,
        artistic: bool,
        status: &str,
    ) {
        let (w, h) = (self.width, self.height);

        // ── Trail wash ────────────────────────────────────────────────────
        for px in self.trail.iter_mut() {
            *px = blend(*px, BG_COLOR, TRAIL_FADE);
        }

        // ── Brush strokes into the trail ──────────────────────────────────
        if artistic {
            for hand in &frame.hands {
                for (finger, tip) in hand.fingertips() {
                    let (x, y) = to_canvas(&tip, w, h);
                    let brush = &BRUSHES[finger % BRUSHES.len()];
                    let radius = brush.size * self.rng.random_range(BRUSH_JITTER);
                    blend_circle(&mut self.trail, w, h, x, y, radius, brush.color, brush.opacity);
                }
            }
        }

        // ── Compose ───────────────────────────────────────────────────────
        self.buf.copy_from_slice(&self.trail);

        // ── Key zones ─────────────────────────────────────────────────────
        // Hit-testing walks zones front-to-back (accidentals first); painting
        // goes back-to-front so the accidentals end up on top.
        for zone in zones.iter().rev() {
            let base = if zone.accidental { ACCIDENTAL_FILL } else { NATURAL_FILL };
            let fill = if active.contains(&zone.note) {
                blend(base, HIGHLIGHT_COLOR, 0.45)
            } else {
                base
            };
            let r = &zone.rect;
            blend_rect(&mut self.buf, w, h, r.x, r.y, r.w, r.h, fill, 0.5);
            draw_border(&mut self.buf, w, h, r.x, r.y, r.w, r.h, ZONE_BORDER);

            let label = zone.note.as_str();
            let text_w = label.len() * 4;
            let lx = (r.x + r.w / 2.0) as isize - text_w as isize / 2;
            let ly = (r.y + r.h) as isize - 10;
            let ink = if zone.accidental { 0xFFEEEEEE } else { 0xFF000000 };
            draw_label(&mut self.buf, w, h, label, lx, ly, ink);
        }

        // ── Hand skeleton ─────────────────────────────────────────────────
        if show_skeleton {
            for hand in &frame.hands {
                let points: Vec<(f32, f32)> = hand
                    .landmarks()
                    .iter()
                    .map(|lm| to_canvas(lm, w, h))
                    .collect();
                if hand.is_complete() {
                    for &(a, b) in &SKELETON_EDGES {
                        draw_line(&mut self.buf, w, h, points[a], points[b], BONE_COLOR);
                    }
                }
                for &(x, y) in &points {
                    blend_circle(&mut self.buf, w, h, x, y, 5.0, DOT_COLOR, 0.8);
                }
            }
        }

        // ── Status bar + legend ───────────────────────────────────────────
        blend_rect(&mut self.buf, w, h, 0.0, 0.0, w as f32, 34.0, BAR_BG, 0.65);
        draw_label(&mut self.buf, w, h, status, 10, 6, 0xFFEEEEEE);
        draw_label(
            &mut self.buf,
            w,
            h,
            "hold lmb=play  a-k=naturals  w-u=sharps  1=skeleton  2=brush  q=quit",
            10,
            20,
            0xFF888888,
        );

        self.window.update_with_buffer(&self.buf, w, h).ok();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Primitive drawing helpers
// ════════════════════════════════════════════════════════════════════════════

fn blend_px(buf: &mut [u32], w: usize, h: usize, x: isize, y: isize, color: u32, t: f32) {
    if x >= 0 && y >= 0 && (x as usize) < w && (y as usize) < h {
        let i = y as usize * w + x as usize;
        buf[i] = blend(buf[i], color, t);
    }
}

fn set_px(buf: &mut [u32], w: usize, h: usize, x: isize, y: isize, color: u32) {
    if x >= 0 && y >= 0 && (x as usize) < w && (y as usize) < h {
        buf[y as usize * w + x as usize] = color;
    }
}

fn blend_rect(buf: &mut [u32], w: usize, h: usize, x: f32, y: f32, rw: f32, rh: f32, color: u32, t: f32) {
    let x0 = x.max(0.0) as usize;
    let y0 = y.max(0.0) as usize;
    let x1 = ((x + rw).max(0.0) as usize).min(w);
    let y1 = ((y + rh).max(0.0) as usize).min(h);
    for row in y0..y1 {
        for col in x0..x1 {
            let i = row * w + col;
            buf[i] = blend(buf[i], color, t);
        }
    }
}

fn draw_border(buf: &mut [u32], w: usize, h: usize, x: f32, y: f32, rw: f32, rh: f32, color: u32) {
    let x0 = x as isize;
    let y0 = y as isize;
    let x1 = (x + rw) as isize - 1;
    let y1 = (y + rh) as isize - 1;
    for col in x0..=x1 {
        set_px(buf, w, h, col, y0, color);
        set_px(buf, w, h, col, y1, color);
    }
    for row in y0..=y1 {
        set_px(buf, w, h, x0, row, color);
        set_px(buf, w, h, x1, row, color);
    }
}

fn blend_circle(buf: &mut [u32], w: usize, h: usize, cx: f32, cy: f32, radius: f32, color: u32, t: f32) {
    let r = radius.max(1.0);
    let r2 = r * r;
    let x0 = (cx - r).floor() as isize;
    let x1 = (cx + r).ceil() as isize;
    let y0 = (cy - r).floor() as isize;
    let y1 = (cy + r).ceil() as isize;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            if dx * dx + dy * dy <= r2 {
                blend_px(buf, w, h, x, y, color, t);
            }
        }
    }
}

/// Bresenham segment between two mapped landmark positions.
fn draw_line(buf: &mut [u32], w: usize, h: usize, from: (f32, f32), to: (f32, f32), color: u32) {
    let (mut x0, mut y0) = (from.0 as isize, from.1 as isize);
    let (x1, y1) = (to.0 as isize, to.1 as isize);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        set_px(buf, w, h, x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Minimal bitmap font — 3×5 characters for labels.
fn draw_label(buf: &mut [u32], w: usize, h: usize, text: &str, x: isize, y: isize, color: u32) {
    let mut cx = x;
    for ch in text.chars() {
        let glyph = char_glyph(ch);
        for (row, &bits) in glyph.iter().enumerate() {
            for col in 0..3isize {
                if bits & (1 << (2 - col)) != 0 {
                    set_px(buf, w, h, cx + col, y + row as isize, color);
                }
            }
        }
        cx += 4; // 3 wide + 1 gap
        if cx + 4 > w as isize {
            break;
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Minimal 3×5 bitmap font
// ────────────────────────────────────────────────────────────────────────────

fn char_glyph(c: char) -> [u8; 5] {
    match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'a' | 'A' => [0b111, 0b101, 0b111, 0b101, 0b101],
        'b' | 'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'c' | 'C' => [0b111, 0b100, 0b100, 0b100, 0b111],
        'd' | 'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'e' | 'E' => [0b111, 0b100, 0b111, 0b100, 0b111],
        'f' | 'F' => [0b111, 0b100, 0b111, 0b100, 0b100],
        'g' | 'G' => [0b111, 0b100, 0b101, 0b101, 0b111],
        'h' | 'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'i' | 'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'j' | 'J' => [0b001, 0b001, 0b001, 0b101, 0b111],
        'k' | 'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'l' | 'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'm' | 'M' => [0b101, 0b111, 0b101, 0b101, 0b101],
        'n' | 'N' => [0b111, 0b101, 0b101, 0b101, 0b101],
        'o' | 'O' => [0b111, 0b101, 0b101, 0b101, 0b111],
        'p' | 'P' => [0b111, 0b101, 0b111, 0b100, 0b100],
        'q' | 'Q' => [0b111, 0b101, 0b101, 0b111, 0b001],
        'r' | 'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        's' | 'S' => [0b111, 0b100, 0b111, 0b001, 0b111],
        't' | 'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'u' | 'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'v' | 'V' => [0b101, 0b101, 0b101, 0b010, 0b010],
        'w' | 'W' => [0b101, 0b101, 0b101, 0b111, 0b101],
        'x' | 'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'y' | 'Y' => [0b101, 0b101, 0b111, 0b010, 0b010],
        'z' | 'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '#' => [0b101, 0b111, 0b101, 0b111, 0b101],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        '+' => [0b000, 0b010, 0b111, 0b010, 0b000],
        ' ' => [0b000, 0b000, 0b000, 0b000, 0b000],
        _ => [0b000, 0b000, 0b010, 0b000, 0b000], // fallback dot
    }
}

/// Alpha-blend two ARGB colors. `t` = 0.0 → all `a`, `t` = 1.0 → all `b`.
fn blend(a: u32, b: u32, t: f32) -> u32 {
    let t = t.clamp(0.0, 1.0);
    let lerp = |ca: u32, cb: u32| (ca as f32 * (1.0 - t) + cb as f32 * t) as u32;
    let ar = (a >> 16) & 0xFF;
    let br = (b >> 16) & 0xFF;
    let ag = (a >> 8) & 0xFF;
    let bg = (b >> 8) & 0xFF;
    let ab = a & 0xFF;
    let bb = b & 0xFF;
    0xFF000000 | (lerp(ar, br) << 16) | (lerp(ag, bg) << 8) | lerp(ab, bb)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_endpoints() {
        assert_eq!(blend(0xFF000000, 0xFFFFFFFF, 0.0), 0xFF000000);
        assert_eq!(blend(0xFF000000, 0xFFFFFFFF, 1.0), 0xFFFFFFFF);
    }

    #[test]
    fn blend_stays_opaque() {
        let c = blend(0xFF123456, 0xFFFEDCBA, 0.37);
        assert_eq!(c >> 24, 0xFF);
    }

    #[test]
    fn blend_px_ignores_out_of_bounds() {
        let mut buf = vec![0u32; 4 * 4];
        blend_px(&mut buf, 4, 4, -1, 0, 0xFFFFFFFF, 1.0);
        blend_px(&mut buf, 4, 4, 0, 7, 0xFFFFFFFF, 1.0);
        assert!(buf.iter().all(|&p| p == 0));
    }

    #[test]
    fn blend_rect_clips_to_canvas() {
        let mut buf = vec![0xFF000000u32; 8 * 8];
        blend_rect(&mut buf, 8, 8, -4.0, -4.0, 20.0, 20.0, 0xFFFFFFFF, 1.0);
        assert!(buf.iter().all(|&p| p == 0xFFFFFFFF));
    }

    #[test]
    fn line_endpoints_are_painted() {
        let mut buf = vec![0u32; 16 * 16];
        draw_line(&mut buf, 16, 16, (1.0, 1.0), (12.0, 9.0), 0xFFFFFFFF);
        assert_eq!(buf[1 * 16 + 1], 0xFFFFFFFF);
        assert_eq!(buf[9 * 16 + 12], 0xFFFFFFFF);
    }

    #[test]
    fn circle_covers_center() {
        let mut buf = vec![0u32; 16 * 16];
        blend_circle(&mut buf, 16, 16, 8.0, 8.0, 3.0, 0xFFFFFFFF, 1.0);
        assert_eq!(buf[8 * 16 + 8], 0xFFFFFFFF);
        assert_eq!(buf[0], 0);
    }

    #[test]
    fn sharp_glyph_exists() {
        assert_ne!(char_glyph('#'), char_glyph('?'));
    }
}
