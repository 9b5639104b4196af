// Scale table for the melodic walk.
//
// The generator walks over an ascending list of MIDI pitches rather than
// over pitch classes: a "scale" here is a fixed two-octave register starting
// at middle C. Indices into that list are what the walk moves through, so
// a step of one index is one scale degree.
//
// The tables are static and never mutated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// C major from C4 to C6.
const MAJOR: [u8; 15] = [60, 62, 64, 65, 67, 69, 71, 72, 74, 76, 77, 79, 81, 83, 84];

/// C-F pentatonic (C D F G A) from C4 to C6.
const PENTATONIC: [u8; 11] = [60, 62, 65, 67, 69, 72, 74, 77, 79, 81, 84];

/// The named scales the generator can walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    #[serde(alias = "c_major")]
    Major,
    #[default]
    Pentatonic,
}

impl Scale {
    pub const ALL: [Scale; 2] = [Scale::Major, Scale::Pentatonic];

    /// Ascending MIDI pitches of this scale.
    pub fn pitches(self) -> &'static [u8] {
        match self {
            Scale::Major => &MAJOR,
            Scale::Pentatonic => &PENTATONIC,
        }
    }

    pub fn len(self) -> usize {
        self.pitches().len()
    }

    pub fn is_empty(self) -> bool {
        self.pitches().is_empty()
    }

    /// Position of `pitch` in the table, or None if it is not a member.
    pub fn index_of(self, pitch: u8) -> Option<usize> {
        self.pitches().iter().position(|&p| p == pitch)
    }

    pub fn name(self) -> &'static str {
        match self {
            Scale::Major => "major",
            Scale::Pentatonic => "pentatonic",
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for an unrecognized scale name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown scale '{0}' (expected major or pentatonic)")]
pub struct UnknownScale(pub String);

impl FromStr for Scale {
    type Err = UnknownScale;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "major" | "c_major" => Ok(Scale::Major),
            "pentatonic" => Ok(Scale::Pentatonic),
            _ => Err(UnknownScale(s.to_string())),
        }
    }
}
