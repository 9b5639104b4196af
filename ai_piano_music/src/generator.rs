// Algorithmic melody generation: a stochastic walk over a scale.
//
// Every melody opens with the same four-note motif (C E G C, quarter-note
// length at 120 qpm) and then takes `steps` further notes. Each step looks
// up the previous pitch in the scale table and picks the next scale index
// by a three-way weighted choice:
//
// - stay on the same index, with probability 0.3 / R;
// - otherwise, half the time, move up or down by 1..=ceil(2R) indices,
//   clamped to the ends of the scale;
// - otherwise jump to a uniformly random index.
//
// R is the randomness factor clamped to [0.1, 2.0]. Higher R means fewer
// repeated notes, wider steps, and a wider spread of note lengths: each
// generated note lasts 0.5 * (0.5 + u * R) seconds.
//
// A previous pitch that is not in the scale is treated as index 0. The seed
// motif's E (64) is not in the pentatonic table, but only the last seed note
// (72) is ever looked up, so in practice this only matters for callers that
// walk from their own pitches via `next_pitch`.
//
// All randomness comes from the caller's `RandomSource`; a seeded source
// gives a reproducible melody.

use crate::scale::Scale;
use crate::sequence::{DEFAULT_VELOCITY, Note, NoteSequence};
use ai_piano_prng::RandomSource;

/// Lower bound of the randomness factor.
pub const MIN_RANDOMNESS: f64 = 0.1;

/// Upper bound of the randomness factor.
pub const MAX_RANDOMNESS: f64 = 2.0;

/// Opening motif every generated melody starts with.
pub const SEED_MOTIF: [u8; 4] = [60, 64, 67, 72];

/// Length of a seed note, and the base length generated notes scale from.
pub const BASE_DURATION: f64 = 0.5;

/// Probability numerator of staying on the same scale index.
const STAY_WEIGHT: f64 = 0.3;

/// Velocity range of generated notes, `[low, high)`.
const VELOCITY_RANGE: (f64, f64) = (60.0, 100.0);

/// Clamp a randomness factor into `[MIN_RANDOMNESS, MAX_RANDOMNESS]`.
///
/// NaN maps to the minimum.
pub fn clamp_randomness(randomness: f64) -> f64 {
    if randomness.is_nan() {
        MIN_RANDOMNESS
    } else {
        randomness.clamp(MIN_RANDOMNESS, MAX_RANDOMNESS)
    }
}

/// Generate a melody of `SEED_MOTIF.len() + steps` notes.
///
/// The result already satisfies every `NoteSequence` invariant: notes are
/// contiguous and non-overlapping, `total_time` is the last note's end, and
/// the metadata is 220 ticks per quarter, 120 qpm, 4/4.
pub fn generate(
    randomness: f64,
    steps: usize,
    scale: Scale,
    rng: &mut impl RandomSource,
) -> NoteSequence {
    let r = clamp_randomness(randomness);
    let mut seq = NoteSequence::with_default_metadata();
    seq.notes.reserve(SEED_MOTIF.len() + steps);

    for (i, &pitch) in SEED_MOTIF.iter().enumerate() {
        seq.notes.push(Note {
            pitch,
            start_time: i as f64 * BASE_DURATION,
            end_time: (i + 1) as f64 * BASE_DURATION,
            velocity: DEFAULT_VELOCITY,
        });
    }
    let mut cursor = SEED_MOTIF.len() as f64 * BASE_DURATION;
    let mut prev = SEED_MOTIF[SEED_MOTIF.len() - 1];

    for _ in 0..steps {
        let pitch = next_pitch(prev, scale, r, rng);
        let (low, high) = VELOCITY_RANGE;
        let velocity = rng.uniform(low, high).floor() as u8;
        let duration = BASE_DURATION * (0.5 + rng.next_f64() * r);

        seq.notes.push(Note {
            pitch,
            start_time: cursor,
            end_time: cursor + duration,
            velocity,
        });
        cursor += duration;
        prev = pitch;
    }

    seq.total_time = cursor;
    log::debug!(
        "generated {} notes over {:.2}s (randomness {r}, {scale})",
        seq.notes.len(),
        seq.total_time
    );
    seq
}

/// Pick the pitch that follows `prev`, given an already-clamped `r`.
pub fn next_pitch(prev: u8, scale: Scale, r: f64, rng: &mut impl RandomSource) -> u8 {
    let current = scale.index_of(prev).unwrap_or_else(|| {
        log::debug!("pitch {prev} is not in the {scale} scale, walking from index 0");
        0
    });
    scale.pitches()[next_index(current, scale.len(), r, rng)]
}

/// The three-way weighted choice over scale indices.
fn next_index(current: usize, len: usize, r: f64, rng: &mut impl RandomSource) -> usize {
    if rng.chance(STAY_WEIGHT / r) {
        current
    } else if rng.chance(0.5) {
        let down = rng.chance(0.5);
        // floor(u * 2R) + 1, so 1..=ceil(2R)
        let magnitude = (rng.next_f64() * 2.0 * r).floor() as usize + 1;
        if down {
            current.saturating_sub(magnitude)
        } else {
            (current + magnitude).min(len - 1)
        }
    } else {
        rng.below(len)
    }
}
