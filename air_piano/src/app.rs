//! Top-level application state machine.
//!
//! `AppState` owns the key zones, the note tracker and the audio sink, and
//! is driven by two inputs each loop iteration: window input (toggles and
//! the manual play keys) and detector frames drained from the source
//! channel.  Frame evaluation is synchronous — one frame at a time, zones
//! always recomputed before evaluation when the canvas size changed.

use std::sync::mpsc::{self, TryRecvError};

use hand_frame::FrameResult;
use key_layout::{KeyZone, KeyboardLayout, NoteId};
use note_engine::{NoteChange, NoteSink, NoteTracker};
use tracing::{debug, info};

use crate::audio;
use crate::source;
use crate::visualizer::{Visualizer, WindowInput};

// ════════════════════════════════════════════════════════════════════════════
// AppConfig
// ════════════════════════════════════════════════════════════════════════════

/// Configuration for the full application.
pub struct AppConfig {
    pub layout: KeyboardLayout,
    /// General MIDI program 0–127.
    pub program: u8,
    pub channel: u8,
    pub velocity: u8,
    /// Initial state of the skeleton/zones overlay toggle.
    pub show_skeleton: bool,
    /// Initial state of the artistic brush toggle.
    pub artistic: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            layout: KeyboardLayout::default_octave(),
            program: 0, // acoustic grand piano
            channel: 0,
            velocity: 100,
            show_skeleton: true,
            artistic: true,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// AppError
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("window error: {0}")]
    Window(String),

    #[error(transparent)]
    Layout(#[from] key_layout::LayoutError),
}

// ════════════════════════════════════════════════════════════════════════════
// AppState
// ════════════════════════════════════════════════════════════════════════════

pub struct AppState {
    layout: KeyboardLayout,
    zones: Vec<KeyZone>,
    canvas: (usize, usize),
    tracker: NoteTracker,
    sink: Box<dyn NoteSink>,
    show_skeleton: bool,
    artistic: bool,
    /// Most recent frame, kept for rendering.
    last_frame: FrameResult,
    status: String,
}

impl AppState {
    pub fn new(cfg: AppConfig, sink: Box<dyn NoteSink>, canvas: (usize, usize)) -> Self {
        let zones = cfg.layout.zones(canvas.0, canvas.1);
        AppState {
            layout: cfg.layout,
            zones,
            canvas,
            tracker: NoteTracker::new(),
            sink,
            show_skeleton: cfg.show_skeleton,
            artistic: cfg.artistic,
            last_frame: FrameResult::empty(),
            status: "ready - hold the left mouse button to play".to_string(),
        }
    }

    /// Recompute zones for new canvas dimensions.  Must run before any
    /// frame evaluation that observes the new size, otherwise hit-testing
    /// silently uses stale geometry.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.canvas = (width, height);
        self.zones = self.layout.zones(width, height);
    }

    /// Evaluate one detector frame against the current zones.
    pub fn handle_frame(&mut self, frame: FrameResult) {
        let changes = self.tracker.process_frame(
            &frame,
            &self.zones,
            self.canvas.0,
            self.canvas.1,
            self.sink.as_mut(),
        );
        if !changes.is_empty() {
            self.refresh_status(&changes);
        }
        self.last_frame = frame;
    }

    /// Route window input: overlay toggles and the manual play keys, which
    /// write through the same tracker state as the frame path.
    pub fn handle_input(&mut self, input: &WindowInput) {
        if input.toggle_skeleton {
            self.show_skeleton = !self.show_skeleton;
        }
        if input.toggle_artistic {
            self.artistic = !self.artistic;
        }

        for &i in &input.natural_down {
            if let Some(note) = self.layout.naturals.get(i).cloned() {
                self.tracker.press(&note, self.sink.as_mut());
            }
        }
        for &i in &input.natural_up {
            if let Some(note) = self.layout.naturals.get(i).cloned() {
                self.tracker.release(&note, self.sink.as_mut());
            }
        }
        for &i in &input.accidental_down {
            if let Some(note) = self.layout.accidentals.get(i).map(|a| a.note.clone()) {
                self.tracker.press(&note, self.sink.as_mut());
            }
        }
        for &i in &input.accidental_up {
            if let Some(note) = self.layout.accidentals.get(i).map(|a| a.note.clone()) {
                self.tracker.release(&note, self.sink.as_mut());
            }
        }
    }

    /// Release every sounding note.  Called on the way out so a closed
    /// window never leaves stuck audio.
    pub fn shutdown(&mut self) {
        self.tracker.release_all(self.sink.as_mut());
    }

    fn refresh_status(&mut self, changes: &[NoteChange]) {
        for change in changes {
            match change {
                NoteChange::Activated(n) => debug!(note = %n, "note on"),
                NoteChange::Deactivated(n) => debug!(note = %n, "note off"),
            }
        }
        if self.tracker.active().is_empty() {
            self.status = "-".to_string();
        } else {
            let names: Vec<&str> = self.tracker.active().iter().map(NoteId::as_str).collect();
            self.status = format!("playing: {}", names.join(" "));
        }
    }

    // ── Accessors for the render loop ─────────────────────────────────────

    pub fn zones(&self) -> &[KeyZone] {
        &self.zones
    }
    pub fn active(&self) -> &std::collections::BTreeSet<NoteId> {
        self.tracker.active()
    }
    pub fn last_frame(&self) -> &FrameResult {
        &self.last_frame
    }
    pub fn show_skeleton(&self) -> bool {
        self.show_skeleton
    }
    pub fn artistic(&self) -> bool {
        self.artistic
    }
    pub fn status(&self) -> &str {
        &self.status
    }
}

// ════════════════════════════════════════════════════════════════════════════
// run() — the main application loop
// ════════════════════════════════════════════════════════════════════════════

/// Run the full application.
///
/// Creates the visualizer window, the frame source (mouse simulation by
/// default, LeapMotion with `--features leap`), the MIDI sink, and drives
/// the poll → evaluate → render loop at ~60 fps.
pub fn run(cfg: AppConfig) -> Result<(), AppError> {
    let (pointer_tx, pointer_rx) = mpsc::channel();

    #[cfg(not(feature = "leap"))]
    let frame_rx = source::spawn_frame_source(source::SimFrameSource { rx: pointer_rx });
    #[cfg(feature = "leap")]
    let frame_rx = {
        drop(pointer_rx); // pointer input unused with real hardware
        source::spawn_frame_source(source::LeapFrameSource)
    };

    let mut vis = Visualizer::new(pointer_tx).map_err(AppError::Window)?;
    let sink = audio::open_sink(cfg.program, cfg.channel, cfg.velocity);
    let mut app = AppState::new(cfg, sink, vis.size());

    info!("session started");

    while vis.is_open() {
        // 1. Window input: quit, toggles, manual play keys, pointer → sim.
        let input = vis.poll_input();
        if input.quit {
            break;
        }
        app.handle_input(&input);

        // 2. Resize before evaluation so zones are never stale for a frame.
        if vis.refresh_size() {
            let (w, h) = vis.size();
            app.resize(w, h);
        }

        // 3. Drain detector frames; each is one synchronous evaluation.
        loop {
            match frame_rx.try_recv() {
                Ok(frame) => app.handle_frame(frame),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    app.shutdown();
                    return Ok(());
                }
            }
        }

        // 4. Render.
        vis.render(
            app.zones(),
            app.active(),
            app.last_frame(),
            app.show_skeleton(),
            app.artistic(),
            app.status(),
        );
    }

    app.shutdown();
    info!("session ended");
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
