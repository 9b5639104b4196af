// Note sequence types.
//
// Two shapes of the same data:
// - `RawNoteSequence` is what a producer hands back, or what arrives as JSON
//   from an external model. Metadata is optional and note fields are untyped
//   JSON values, so a note with a string pitch or a missing endTime can be
//   represented and rejected by validate.rs instead of failing to parse.
// - `NoteSequence` is the validated, normalized value every consumer
//   (midi.rs, piano_roll.rs) takes. Only validate.rs and generator.rs
//   construct one, and both guarantee the invariants below.
//
// Invariants of a `NoteSequence`:
// - every note has `start_time < end_time` and `start_time >= 0`
// - `total_time >= max(end_time)`
// - `tempos` and `time_signatures` are non-empty, sorted by time, and the
//   first entry of each sits at time 0
// - `0 < ticks_per_quarter <= MAX_TICKS_PER_QUARTER`
//
// JSON field names are camelCase to match the interchange format external
// models speak (`startTime`, `ticksPerQuarter`, `quantizationInfo`, ...).
// Metadata is read leniently: a tempo without `time` starts at 0, and a
// `ticksPerQuarter` that is not a usable resolution counts as absent.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// MIDI resolution applied when a sequence does not specify one.
pub const DEFAULT_TICKS_PER_QUARTER: u16 = 220;

/// Largest resolution a metrical SMF header can carry (15 bits).
pub const MAX_TICKS_PER_QUARTER: u16 = 0x7fff;

/// Tempo applied when a sequence has no tempo events.
pub const DEFAULT_QPM: f64 = 120.0;

/// Velocity applied to notes that lack one.
pub const DEFAULT_VELOCITY: u8 = 80;

/// A single sounding note, times in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// MIDI key number (0-127).
    pub pitch: u8,
    pub start_time: f64,
    pub end_time: f64,
    /// MIDI velocity (1-127).
    pub velocity: u8,
}

impl Note {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// A tempo change at `time` seconds, in quarter notes per minute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tempo {
    pub time: f64,
    pub qpm: f64,
}

impl Default for Tempo {
    fn default() -> Self {
        Tempo {
            time: 0.0,
            qpm: DEFAULT_QPM,
        }
    }
}

/// A meter change at `time` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSignature {
    pub time: f64,
    pub numerator: u8,
    pub denominator: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        TimeSignature {
            time: 0.0,
            numerator: 4,
            denominator: 4,
        }
    }
}

/// Marker carried by quantized (step-grid) sequences.
///
/// Its presence alone makes a sequence unexportable; the contents are kept
/// only so the marker survives a JSON round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantizationInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps_per_quarter: Option<u32>,
}

/// A validated, normalized melody.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteSequence {
    /// Notes in generation order.
    pub notes: Vec<Note>,
    /// Length of the sequence in seconds.
    pub total_time: f64,
    pub ticks_per_quarter: u16,
    pub tempos: Vec<Tempo>,
    pub time_signatures: Vec<TimeSignature>,
}

impl NoteSequence {
    /// An empty sequence carrying the default metadata (220 tpq, 120 qpm, 4/4).
    pub fn with_default_metadata() -> Self {
        NoteSequence {
            notes: Vec::new(),
            total_time: 0.0,
            ticks_per_quarter: DEFAULT_TICKS_PER_QUARTER,
            tempos: vec![Tempo::default()],
            time_signatures: vec![TimeSignature::default()],
        }
    }

    /// Latest note end, or 0.0 for an empty sequence.
    pub fn max_end_time(&self) -> f64 {
        self.notes.iter().map(|n| n.end_time).fold(0.0, f64::max)
    }

    /// Lowest and highest pitch, or None for an empty sequence.
    pub fn pitch_range(&self) -> Option<(u8, u8)> {
        let min = self.notes.iter().map(|n| n.pitch).min()?;
        let max = self.notes.iter().map(|n| n.pitch).max()?;
        Some((min, max))
    }
}

/// A note as supplied by a producer, before validation.
///
/// Missing fields deserialize to `Value::Null`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNote {
    #[serde(default)]
    pub pitch: Value,
    #[serde(default)]
    pub start_time: Value,
    #[serde(default)]
    pub end_time: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub velocity: Value,
}

impl RawNote {
    /// A note with numeric pitch and times and no velocity.
    pub fn new(pitch: u8, start_time: f64, end_time: f64) -> Self {
        RawNote {
            pitch: Value::from(pitch),
            start_time: Value::from(start_time),
            end_time: Value::from(end_time),
            velocity: Value::Null,
        }
    }

    pub fn with_velocity(mut self, velocity: u8) -> Self {
        self.velocity = Value::from(velocity);
        self
    }
}

impl From<&Note> for RawNote {
    fn from(note: &Note) -> Self {
        RawNote::new(note.pitch, note.start_time, note.end_time).with_velocity(note.velocity)
    }
}

/// A sequence as supplied by a producer, before validation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNoteSequence {
    #[serde(default)]
    pub notes: Vec<RawNote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_time: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_ticks_per_quarter",
        skip_serializing_if = "Option::is_none"
    )]
    pub ticks_per_quarter: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tempos: Option<Vec<Tempo>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_signatures: Option<Vec<TimeSignature>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantization_info: Option<QuantizationInfo>,
}

impl RawNoteSequence {
    pub fn is_quantized(&self) -> bool {
        self.quantization_info.is_some()
    }
}

/// True for a resolution the MIDI header can hold.
pub fn is_valid_ticks_per_quarter(ticks: u16) -> bool {
    (1..=MAX_TICKS_PER_QUARTER).contains(&ticks)
}

/// Any JSON number that is a whole, in-range resolution (`480` or `480.0`);
/// everything else reads as absent.
fn lenient_ticks_per_quarter<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_f64()
        .filter(|t| t.fract() == 0.0 && *t >= 1.0 && *t <= MAX_TICKS_PER_QUARTER as f64)
        .map(|t| t as u16))
}

impl From<&NoteSequence> for RawNoteSequence {
    fn from(seq: &NoteSequence) -> Self {
        RawNoteSequence {
            notes: seq.notes.iter().map(RawNote::from).collect(),
            total_time: Some(seq.total_time),
            ticks_per_quarter: Some(seq.ticks_per_quarter),
            tempos: Some(seq.tempos.clone()),
            time_signatures: Some(seq.time_signatures.clone()),
            quantization_info: None,
        }
    }
}
