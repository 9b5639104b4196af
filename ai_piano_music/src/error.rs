// Error types for the generation pipeline.
//
// Each failure kind stops at a different place:
// - `ProducerError` never leaves producer.rs's chain; the chain logs it and
//   falls back to the algorithmic producer.
// - `ValidationError` is returned to the caller, and its `Display` text is
//   the user-facing rule message. Export of that sequence is aborted.
// - `EncodeError` comes out of midi.rs for a sequence that validated but
//   still cannot be written as a Standard MIDI File.
// - `ConfigError` is a bad or unreadable config file; the CLI reports it and
//   exits before generating anything.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A rule a candidate sequence broke. Checks run in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No notes in sequence")]
    Empty,
    #[error("Cannot export quantized sequences to MIDI - use unquantized sequences")]
    Quantized,
    #[error("Invalid note properties - unquantized notes require pitch, startTime, endTime")]
    NonNumericNote { index: usize },
    #[error("Invalid note timing - startTime must be less than endTime")]
    InvertedTiming { index: usize },
    #[error("Invalid note pitch - pitch must be a MIDI key number from 0 to 127")]
    PitchOutOfRange { index: usize },
    #[error("Invalid note timing - startTime must not be negative")]
    NegativeStart { index: usize },
}

impl ValidationError {
    /// Index of the offending note, for the per-note rules.
    pub fn note_index(&self) -> Option<usize> {
        match *self {
            ValidationError::Empty | ValidationError::Quantized => None,
            ValidationError::NonNumericNote { index }
            | ValidationError::InvertedTiming { index }
            | ValidationError::PitchOutOfRange { index }
            | ValidationError::NegativeStart { index } => Some(index),
        }
    }
}

/// Failure of a sequence producer to return a candidate.
#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("model command is empty")]
    NoCommand,
    #[error("failed to run model command '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("model command '{command}' exited with {status}: {stderr}")]
    Exited {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("model I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("model output is not a note sequence: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Failure to turn a validated sequence into MIDI bytes.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("ticks per quarter {0} is outside 1..=32767")]
    TicksPerQuarter(u16),
    #[error("tempo of {0} qpm cannot be written to MIDI")]
    Tempo(f64),
    #[error("time signature {numerator}/{denominator} cannot be written to MIDI")]
    TimeSignature { numerator: u8, denominator: u8 },
    #[error("event at {0} seconds is past the end of the MIDI timeline")]
    TickOverflow(f64),
    #[error("failed to write MIDI: {0}")]
    Io(#[from] io::Error),
}

/// Failure to load a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_rules() {
        assert_eq!(ValidationError::Empty.to_string(), "No notes in sequence");
        assert_eq!(
            ValidationError::InvertedTiming { index: 3 }.to_string(),
            "Invalid note timing - startTime must be less than endTime"
        );
        assert_eq!(
            ValidationError::Quantized.to_string(),
            "Cannot export quantized sequences to MIDI - use unquantized sequences"
        );
    }

    #[test]
    fn note_index_only_for_note_rules() {
        assert_eq!(ValidationError::Empty.note_index(), None);
        assert_eq!(ValidationError::NonNumericNote { index: 2 }.note_index(), Some(2));
    }
}
