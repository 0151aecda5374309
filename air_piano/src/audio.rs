//! Real-time MIDI note output.
//!
//! The state machine speaks note names ("C4", "F#4"); this module converts
//! them to MIDI numbers and sends note on/off messages to the first usable
//! MIDI output port.  With no port available the sink degrades to a silent
//! null implementation — losing audio is a degraded mode here, never an
//! error the pipeline has to handle.

use key_layout::NoteId;
use note_engine::NoteSink;
use tracing::{debug, info, warn};

// ════════════════════════════════════════════════════════════════════════════
// Note-name → MIDI number
// ════════════════════════════════════════════════════════════════════════════

/// Convert a note name to its MIDI number (C4 = 60).
///
/// Accepts a letter A–G (either case), one optional `#` or `b`, and an
/// octave (may be negative, as in `"C-1"` = 0).  Returns `None` for
/// malformed names or pitches outside 0–127.
pub fn midi_number(note: &NoteId) -> Option<u8> {
    let mut chars = note.as_str().chars();
    let base: i32 = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let rest: String = chars.collect();
    let (accidental, octave_str) = if let Some(r) = rest.strip_prefix('#') {
        (1, r)
    } else if let Some(r) = rest.strip_prefix('b') {
        (-1, r)
    } else {
        (0, rest.as_str())
    };
    let octave: i32 = octave_str.parse().ok()?;
    let n = (octave + 1) * 12 + base + accidental;
    (0..=127).contains(&n).then(|| n as u8)
}

// ════════════════════════════════════════════════════════════════════════════
// Sinks
// ════════════════════════════════════════════════════════════════════════════

/// Silent fallback when no MIDI port is available.
pub struct NullSink;

impl NoteSink for NullSink {
    fn note_on(&mut self, _note: &NoteId) {}
    fn note_off(&mut self, _note: &NoteId) {}
}

/// Sends note on/off over a midir connection.
pub struct MidiSink {
    conn: midir::MidiOutputConnection,
    channel: u8,
    velocity: u8,
}

impl MidiSink {
    pub fn new(conn: midir::MidiOutputConnection, channel: u8, velocity: u8) -> Self {
        MidiSink {
            conn,
            channel: channel & 0x0F,
            velocity: velocity.min(127),
        }
    }
}

impl NoteSink for MidiSink {
    fn note_on(&mut self, note: &NoteId) {
        match midi_number(note) {
            Some(n) => {
                let _ = self.conn.send(&[0x90 | self.channel, n, self.velocity]);
            }
            None => debug!(note = %note, "unplayable note name"),
        }
    }

    fn note_off(&mut self, note: &NoteId) {
        if let Some(n) = midi_number(note) {
            let _ = self.conn.send(&[0x80 | self.channel, n, 0]);
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// open_sink — enumerate ports and pick first available
// ════════════════════════════════════════════════════════════════════════════

/// Try to open the first available MIDI output port and select `program` on
/// `channel`.  Falls back to [`NullSink`] with a warning if none is found.
pub fn open_sink(program: u8, channel: u8, velocity: u8) -> Box<dyn NoteSink> {
    let midi_out = match midir::MidiOutput::new("air_piano") {
        Ok(m) => m,
        Err(e) => {
            warn!("MIDI init error: {} — running silent", e);
            return Box::new(NullSink);
        }
    };

    let ports = midi_out.ports();
    if ports.is_empty() {
        warn!("no MIDI output ports found — running silent");
        warn!("install a MIDI synthesiser such as:");
        warn!("  • macOS: built-in CoreMIDI (always available)");
        warn!("  • Linux: `timidity -iA` or `fluidsynth`");
        warn!("  • Windows: built-in GS Wavetable Synth");
        return Box::new(NullSink);
    }

    // Prefer a softsynth if visible
    let port_idx = ports
        .iter()
        .enumerate()
        .find(|(_, p)| {
            midi_out
                .port_name(p)
                .map(|n| {
                    let n = n.to_lowercase();
                    n.contains("fluid")
                        || n.contains("timidity")
                        || n.contains("microsoft")
                        || n.contains("gm")
                        || n.contains("synth")
                })
                .unwrap_or(false)
        })
        .map(|(i, _)| i)
        .unwrap_or(0);

    let port = &ports[port_idx];
    let name = midi_out
        .port_name(port)
        .unwrap_or_else(|_| "Unknown".to_string());
    info!("opening MIDI port: {}", name);

    match midi_out.connect(port, "air-piano-out") {
        Ok(mut conn) => {
            let _ = conn.send(&[0xC0 | (channel & 0x0F), program.min(127)]);
            Box::new(MidiSink::new(conn, channel, velocity))
        }
        Err(e) => {
            warn!("failed to connect: {} — running silent", e);
            Box::new(NullSink)
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn num(name: &str) -> Option<u8> {
        midi_number(&NoteId::new(name))
    }

    #[test]
    fn middle_c() {
        assert_eq!(num("C4"), Some(60));
    }

    #[test]
    fn concert_a() {
        assert_eq!(num("A4"), Some(69));
    }

    #[test]
    fn sharps_and_flats() {
        assert_eq!(num("C#4"), Some(61));
        assert_eq!(num("Db4"), Some(61));
        assert_eq!(num("Bb3"), Some(58));
    }

    #[test]
    fn octave_extremes() {
        assert_eq!(num("C-1"), Some(0));
        assert_eq!(num("G9"), Some(127));
        assert_eq!(num("G#9"), None); // 128 — out of range
    }

    #[test]
    fn lowercase_letter_accepted() {
        assert_eq!(num("c4"), Some(60));
    }

    #[test]
    fn malformed_names_rejected() {
        assert_eq!(num("H4"), None);
        assert_eq!(num("C"), None);
        assert_eq!(num("C#"), None);
        assert_eq!(num(""), None);
        assert_eq!(num("4C"), None);
    }

    #[test]
    fn null_sink_is_inert() {
        let mut sink = NullSink;
        sink.note_on(&NoteId::new("C4"));
        sink.note_off(&NoteId::new("C4"));
    }
}
