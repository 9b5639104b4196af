// MIDI output from validated note sequences.
//
// Converts a NoteSequence into a Standard MIDI File for download and
// playback. Everything goes on one track (SMF format 0): tempo and time
// signature meta events, a program change to acoustic grand piano, then a
// note-on/note-off pair per note.
//
// Note times are in seconds, so they are mapped to ticks through the
// sequence's tempo map: each tempo segment advances `qpm / 60 *
// ticks_per_quarter` ticks per second. Validated sequences always carry a
// tempo at time 0; a hand-built one whose first tempo comes later plays at
// 120 qpm until then.
//
// Uses the `midly` crate for the byte-level encoding.

use crate::error::EncodeError;
use crate::sequence::{DEFAULT_QPM, NoteSequence, Tempo, is_valid_ticks_per_quarter};
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::path::Path;

/// Name written into the track header.
const TRACK_NAME: &[u8] = b"AI Piano";

/// General MIDI program 0, acoustic grand piano.
const PIANO_PROGRAM: u8 = 0;

const MAX_TEMPO_MICROS: f64 = 0xFF_FFFF as f64;
const MAX_DELTA: u32 = 0x0FFF_FFFF;

/// File name for a download made at `epoch_ms` milliseconds since the epoch.
pub fn export_file_name(epoch_ms: i64) -> String {
    format!("ai-piano-music-{epoch_ms}.mid")
}

/// Encode a sequence and write it to `path`.
pub fn write_midi(seq: &NoteSequence, path: &Path) -> Result<(), EncodeError> {
    let bytes = encode(seq)?;
    std::fs::write(path, &bytes)?;
    Ok(())
}

/// Encode a sequence as Standard MIDI File bytes.
pub fn encode(seq: &NoteSequence) -> Result<Vec<u8>, EncodeError> {
    let smf = sequence_to_smf(seq)?;
    let mut buf = Vec::new();
    smf.write_std(&mut buf)?;
    Ok(buf)
}

/// Ordering of events that share a tick: meta first, then releases, then
/// attacks, so a repeated pitch is released before it is struck again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Slot {
    Meta,
    Program,
    NoteOff,
    NoteOn,
}

fn sequence_to_smf(seq: &NoteSequence) -> Result<Smf<'static>, EncodeError> {
    let tpq = seq.ticks_per_quarter;
    if !is_valid_ticks_per_quarter(tpq) {
        return Err(EncodeError::TicksPerQuarter(tpq));
    }
    let tempo_map = TempoMap::new(&seq.tempos, tpq)?;
    let channel = u4::new(0);

    let mut events: Vec<(u32, Slot, TrackEventKind<'static>)> = Vec::new();

    for tempo in &seq.tempos {
        let micros = (60_000_000.0 / tempo.qpm).round();
        if !(1.0..=MAX_TEMPO_MICROS).contains(&micros) {
            return Err(EncodeError::Tempo(tempo.qpm));
        }
        events.push((
            tempo_map.tick_at(tempo.time)?,
            Slot::Meta,
            TrackEventKind::Meta(MetaMessage::Tempo(u24::new(micros as u32))),
        ));
    }

    for sig in &seq.time_signatures {
        let (numerator, denominator) = (sig.numerator, sig.denominator);
        if numerator == 0 || !denominator.is_power_of_two() {
            return Err(EncodeError::TimeSignature {
                numerator,
                denominator,
            });
        }
        events.push((
            tempo_map.tick_at(sig.time)?,
            Slot::Meta,
            TrackEventKind::Meta(MetaMessage::TimeSignature(
                numerator,
                denominator.trailing_zeros() as u8,
                24,
                8,
            )),
        ));
    }

    events.push((
        0,
        Slot::Program,
        TrackEventKind::Midi {
            channel,
            message: MidiMessage::ProgramChange {
                program: u7::new(PIANO_PROGRAM),
            },
        },
    ));

    for note in &seq.notes {
        let key = u7::new(note.pitch.min(127));
        let on = tempo_map.tick_at(note.start_time)?;
        // A note shorter than one tick still sounds for one tick.
        let off = tempo_map.tick_at(note.end_time)?.max(on + 1);
        events.push((
            on,
            Slot::NoteOn,
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn {
                    key,
                    vel: u7::new(note.velocity.clamp(1, 127)),
                },
            },
        ));
        events.push((
            off,
            Slot::NoteOff,
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOff {
                    key,
                    vel: u7::new(0),
                },
            },
        ));
    }

    events.sort_by_key(|&(tick, slot, _)| (tick, slot));

    let mut track: Track<'static> = Vec::with_capacity(events.len() + 2);
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(TRACK_NAME)),
    });
    let mut last_tick = 0u32;
    for (tick, _, kind) in events {
        let delta = tick - last_tick;
        if delta > MAX_DELTA {
            return Err(EncodeError::TickOverflow(tempo_map.seconds_at(tick)));
        }
        track.push(TrackEvent {
            delta: u28::new(delta),
            kind,
        });
        last_tick = tick;
    }
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let mut smf = Smf::new(Header::new(
        Format::SingleTrack,
        Timing::Metrical(u15::new(tpq)),
    ));
    smf.tracks.push(track);
    Ok(smf)
}

/// One constant-tempo stretch of the timeline.
#[derive(Debug, Clone, Copy)]
struct Segment {
    start_seconds: f64,
    start_ticks: f64,
    ticks_per_second: f64,
}

/// Piecewise-linear seconds-to-ticks mapping.
#[derive(Debug, Clone)]
struct TempoMap {
    segments: Vec<Segment>,
}

impl TempoMap {
    fn new(tempos: &[Tempo], tpq: u16) -> Result<Self, EncodeError> {
        let rate = |qpm: f64| qpm / 60.0 * tpq as f64;
        let mut map = TempoMap {
            segments: vec![Segment {
                start_seconds: 0.0,
                start_ticks: 0.0,
                ticks_per_second: rate(DEFAULT_QPM),
            }],
        };
        for tempo in tempos {
            if !(tempo.qpm.is_finite() && tempo.qpm > 0.0) {
                return Err(EncodeError::Tempo(tempo.qpm));
            }
            let start_seconds = tempo.time.max(0.0);
            let segment = Segment {
                start_seconds,
                start_ticks: map.ticks_at(start_seconds),
                ticks_per_second: rate(tempo.qpm),
            };
            match map.segments.last_mut() {
                Some(last) if last.start_seconds == start_seconds => *last = segment,
                _ => map.segments.push(segment),
            }
        }
        Ok(map)
    }

    fn segment_for(&self, seconds: f64) -> &Segment {
        let i = self
            .segments
            .partition_point(|s| s.start_seconds <= seconds)
            .saturating_sub(1);
        &self.segments[i]
    }

    fn ticks_at(&self, seconds: f64) -> f64 {
        let s = self.segment_for(seconds);
        s.start_ticks + (seconds - s.start_seconds) * s.ticks_per_second
    }

    /// Rounded tick of `seconds`, clamped at zero.
    fn tick_at(&self, seconds: f64) -> Result<u32, EncodeError> {
        let ticks = self.ticks_at(seconds.max(0.0)).round();
        if !ticks.is_finite() || ticks > u32::MAX as f64 - 1.0 {
            return Err(EncodeError::TickOverflow(seconds));
        }
        Ok(ticks as u32)
    }

    /// Inverse of `ticks_at`, for error messages.
    fn seconds_at(&self, tick: u32) -> f64 {
        let tick = tick as f64;
        let i = self
            .segments
            .partition_point(|s| s.start_ticks <= tick)
            .saturating_sub(1);
        let s = &self.segments[i];
        s.start_seconds + (tick - s.start_ticks) / s.ticks_per_second
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::generate;
    use crate::scale::Scale;
    use crate::sequence::{Note, TimeSignature};
    use ai_piano_prng::MelodyRng;

    fn note_events(smf: &Smf<'_>) -> Vec<(u32, bool, u8, u8)> {
        let mut tick = 0u32;
        let mut out = Vec::new();
        for event in &smf.tracks[0] {
            tick += event.delta.as_int();
            if let TrackEventKind::Midi { message, .. } = event.kind {
                match message {
                    MidiMessage::NoteOn { key, vel } => {
                        out.push((tick, true, key.as_int(), vel.as_int()))
                    }
                    MidiMessage::NoteOff { key, vel } => {
                        out.push((tick, false, key.as_int(), vel.as_int()))
                    }
                    _ => {}
                }
            }
        }
        out
    }

    fn single_note(start: f64, end: f64) -> NoteSequence {
        let mut seq = NoteSequence::with_default_metadata();
        seq.notes.push(Note {
            pitch: 60,
            start_time: start,
            end_time: end,
            velocity: 90,
        });
        seq.total_time = end;
        seq
    }

    #[test]
    fn export_name_uses_timestamp() {
        assert_eq!(
            export_file_name(1_700_000_000_123),
            "ai-piano-music-1700000000123.mid"
        );
    }

    #[test]
    fn seed_motif_encodes_on_the_beat() {
        let seq = generate(1.0, 0, Scale::Pentatonic, &mut MelodyRng::new(1));
        let bytes = encode(&seq).unwrap();
        let smf = Smf::parse(&bytes).unwrap();

        assert_eq!(smf.header.format, Format::SingleTrack);
        assert_eq!(smf.header.timing, Timing::Metrical(u15::new(220)));
        assert_eq!(smf.tracks.len(), 1);

        // 0.5s at 120 qpm is one quarter note, 220 ticks.
        let events = note_events(&smf);
        assert_eq!(
            events,
            vec![
                (0, true, 60, 80),
                (220, false, 60, 0),
                (220, true, 64, 80),
                (440, false, 64, 0),
                (440, true, 67, 80),
                (660, false, 67, 0),
                (660, true, 72, 80),
                (880, false, 72, 0),
            ]
        );
    }

    #[test]
    fn meta_events_are_written() {
        let seq = single_note(0.0, 1.0);
        let smf_bytes = encode(&seq).unwrap();
        let smf = Smf::parse(&smf_bytes).unwrap();
        let metas: Vec<MetaMessage<'_>> = smf.tracks[0]
            .iter()
            .filter_map(|e| match e.kind {
                TrackEventKind::Meta(m) => Some(m),
                _ => None,
            })
            .collect();
        assert!(metas.contains(&MetaMessage::Tempo(u24::new(500_000))));
        assert!(metas.contains(&MetaMessage::TimeSignature(4, 2, 24, 8)));
        assert_eq!(metas.last(), Some(&MetaMessage::EndOfTrack));
    }

    #[test]
    fn every_generated_note_is_written() {
        let seq = generate(1.7, 100, Scale::Major, &mut MelodyRng::new(12));
        let smf_bytes = encode(&seq).unwrap();
        let smf = Smf::parse(&smf_bytes).unwrap();
        let events = note_events(&smf);
        let ons = events.iter().filter(|e| e.1).count();
        let offs = events.iter().filter(|e| !e.1).count();
        assert_eq!(ons, seq.notes.len());
        assert_eq!(offs, seq.notes.len());
    }

    #[test]
    fn tempo_changes_bend_the_timeline() {
        let map = TempoMap::new(
            &[
                Tempo {
                    time: 0.0,
                    qpm: 120.0,
                },
                Tempo {
                    time: 1.0,
                    qpm: 60.0,
                },
            ],
            220,
        )
        .unwrap();
        assert_eq!(map.tick_at(1.0).unwrap(), 440);
        assert_eq!(map.tick_at(2.0).unwrap(), 660);
        assert!((map.seconds_at(660) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn late_first_tempo_uses_default_before_it() {
        let map = TempoMap::new(
            &[Tempo {
                time: 1.0,
                qpm: 240.0,
            }],
            100,
        )
        .unwrap();
        assert_eq!(map.tick_at(1.0).unwrap(), 200);
        assert_eq!(map.tick_at(1.5).unwrap(), 400);
    }

    #[test]
    fn tiny_note_lasts_one_tick() {
        let seq = single_note(0.0, 0.0001);
        let smf_bytes = encode(&seq).unwrap();
        let smf = Smf::parse(&smf_bytes).unwrap();
        let events = note_events(&smf);
        assert_eq!(events[0].0, 0);
        assert_eq!(events[1].0, 1);
    }

    #[test]
    fn rejects_unwritable_metadata() {
        let mut seq = single_note(0.0, 1.0);
        seq.ticks_per_quarter = 0;
        assert!(matches!(encode(&seq), Err(EncodeError::TicksPerQuarter(0))));

        let mut seq = single_note(0.0, 1.0);
        seq.ticks_per_quarter = 40_000;
        assert!(matches!(
            encode(&seq),
            Err(EncodeError::TicksPerQuarter(40_000))
        ));

        let mut seq = single_note(0.0, 1.0);
        seq.tempos[0].qpm = 0.0;
        assert!(matches!(encode(&seq), Err(EncodeError::Tempo(_))));

        let mut seq = single_note(0.0, 1.0);
        seq.time_signatures = vec![TimeSignature {
            time: 0.0,
            numerator: 3,
            denominator: 3,
        }];
        assert!(matches!(
            encode(&seq),
            Err(EncodeError::TimeSignature {
                numerator: 3,
                denominator: 3
            })
        ));
    }

    #[test]
    fn write_midi_creates_file() {
        let dir = std::env::temp_dir().join(format!("ai-piano-midi-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(export_file_name(42));
        write_midi(&single_note(0.0, 1.0), &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..4], b"MThd");
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
