// AI Piano melody generator
//
// Produces a short monophonic piano melody from a randomness factor and a
// length, validates it into a self-contained note sequence, and hands it to
// a MIDI encoder and a piano-roll renderer. The melody either comes from an
// external sequence model (when one is configured and succeeds) or from an
// algorithmic stochastic walk over a scale.
//
// Architecture:
// - scale.rs: Static scale tables (major, pentatonic) the walk moves over
// - sequence.rs: Note/NoteSequence types, validated and raw (producer) forms
// - generator.rs: The seeded stochastic walk (seed motif + weighted steps)
// - validate.rs: Ordered validation checks + normalization to defaults
// - producer.rs: Producer interface, external model process, fallback chain
// - midi.rs: Standard MIDI File output via midly, export file naming
// - piano_roll.rs: Time/pitch rectangle layout and SVG rendering
// - config.rs: JSON-loadable generator configuration
// - error.rs: Validation, producer, encoder and config errors
//
// The generator is deterministic given a seed, supporting reproducible output.

pub mod config;
pub mod error;
pub mod generator;
pub mod midi;
pub mod piano_roll;
pub mod producer;
pub mod scale;
pub mod sequence;
pub mod validate;

#[cfg(test)]
mod testing;
