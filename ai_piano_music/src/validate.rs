// Validation and normalization of candidate sequences.
//
// Any producer's output passes through `validate` before it reaches the MIDI
// encoder or the piano roll. The checks run in a fixed order and the first
// failure decides the error:
//
// 1. the sequence has notes
// 2. it carries no `quantizationInfo` marker
// 3. every note has numeric pitch, startTime and endTime
// 4. every note starts before it ends
// 5. every pitch is a MIDI key number (0-127)
// 6. no note starts before time zero
//
// Checks 3-6 each scan all notes before the next check runs, so a
// non-numeric note anywhere is reported ahead of an inverted note earlier in
// the list.
//
// On success a new `NoteSequence` is built with the defaults filled in
// (220 ticks per quarter, 120 qpm, 4/4, velocity 80) and `total_time` raised
// to cover the last note. Tempo and meter events before time 0 are moved to
// 0, and when the first event comes later the default is put in front of it. The input is never modified, so re-validating the
// raw form of the result gives back an identical value.

use crate::error::ValidationError;
use crate::sequence::{
    DEFAULT_TICKS_PER_QUARTER, DEFAULT_VELOCITY, Note, NoteSequence, RawNoteSequence, Tempo,
    TimeSignature, is_valid_ticks_per_quarter,
};
use serde::Serialize;
use serde_json::Value;

/// Validate a candidate and build its normalized form.
pub fn validate(raw: &RawNoteSequence) -> Result<NoteSequence, ValidationError> {
    if raw.notes.is_empty() {
        return Err(ValidationError::Empty);
    }
    if raw.is_quantized() {
        return Err(ValidationError::Quantized);
    }

    let mut fields: Vec<(f64, f64, f64)> = Vec::with_capacity(raw.notes.len());
    for (index, note) in raw.notes.iter().enumerate() {
        match (
            note.pitch.as_f64(),
            note.start_time.as_f64(),
            note.end_time.as_f64(),
        ) {
            (Some(pitch), Some(start), Some(end)) => fields.push((pitch, start, end)),
            _ => return Err(ValidationError::NonNumericNote { index }),
        }
    }
    if let Some(index) = fields.iter().position(|&(_, start, end)| start >= end) {
        return Err(ValidationError::InvertedTiming { index });
    }
    if let Some(index) = fields.iter().position(|&(pitch, _, _)| !is_midi_key(pitch)) {
        return Err(ValidationError::PitchOutOfRange { index });
    }
    if let Some(index) = fields.iter().position(|&(_, start, _)| start < 0.0) {
        return Err(ValidationError::NegativeStart { index });
    }

    let notes: Vec<Note> = fields
        .iter()
        .zip(&raw.notes)
        .map(|(&(pitch, start_time, end_time), note)| Note {
            pitch: pitch as u8,
            start_time,
            end_time,
            velocity: normalize_velocity(&note.velocity),
        })
        .collect();

    let max_end = notes.iter().map(|n| n.end_time).fold(0.0, f64::max);
    let total_time = match raw.total_time {
        Some(t) if t >= max_end => t,
        _ => max_end,
    };

    let ticks_per_quarter = match raw.ticks_per_quarter {
        Some(t) if is_valid_ticks_per_quarter(t) => t,
        _ => DEFAULT_TICKS_PER_QUARTER,
    };

    let tempos = timeline(raw.tempos.as_deref());
    let time_signatures = timeline(raw.time_signatures.as_deref());

    Ok(NoteSequence {
        notes,
        total_time,
        ticks_per_quarter,
        tempos,
        time_signatures,
    })
}

/// Validate `raw` and, on success, replace it with its normalized form.
///
/// On failure `raw` is left untouched.
pub fn validate_in_place(raw: &mut RawNoteSequence) -> ValidationReport {
    let result = validate(raw);
    if let Ok(seq) = &result {
        *raw = RawNoteSequence::from(seq);
    }
    ValidationReport::from(&result)
}

/// The `{valid, error}` summary of a validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> From<&Result<T, ValidationError>> for ValidationReport {
    fn from(result: &Result<T, ValidationError>) -> Self {
        match result {
            Ok(_) => ValidationReport {
                valid: true,
                error: None,
            },
            Err(e) => ValidationReport {
                valid: false,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Tempo and meter events share one normalization.
trait TimedEvent: Copy + Default {
    fn time(&self) -> f64;
    fn set_time(&mut self, time: f64);
}

impl TimedEvent for Tempo {
    fn time(&self) -> f64 {
        self.time
    }

    fn set_time(&mut self, time: f64) {
        self.time = time;
    }
}

impl TimedEvent for TimeSignature {
    fn time(&self) -> f64 {
        self.time
    }

    fn set_time(&mut self, time: f64) {
        self.time = time;
    }
}

/// Sorted events starting at time 0; the default fills any gap before the
/// first one.
fn timeline<T: TimedEvent>(events: Option<&[T]>) -> Vec<T> {
    let mut events = events.unwrap_or_default().to_vec();
    for event in &mut events {
        event.set_time(event.time().max(0.0));
    }
    events.sort_by(|a, b| a.time().total_cmp(&b.time()));
    if events.first().is_none_or(|first| first.time() > 0.0) {
        events.insert(0, T::default());
    }
    events
}

fn is_midi_key(pitch: f64) -> bool {
    pitch.fract() == 0.0 && (0.0..=127.0).contains(&pitch)
}

/// Positive velocities are floored into 1..=127; anything else gets the default.
fn normalize_velocity(velocity: &Value) -> u8 {
    match velocity.as_f64() {
        Some(v) if v > 0.0 => v.floor().clamp(1.0, 127.0) as u8,
        _ => DEFAULT_VELOCITY,
    }
}
