// Sequence producers and the fallback chain.
//
// A producer turns a `GenerationRequest` into a candidate `RawNoteSequence`.
// There are two:
// - `AlgorithmicProducer` runs the scale walk in generator.rs. It owns its
//   `RandomSource` and never fails.
// - `ExternalModelProducer` hands the request to an external model process
//   as JSON on stdin and reads a note sequence back from stdout. The model
//   is asked to continue the four-note seed motif, which is sent marked as
//   quantized (4 steps per quarter), the form sequence models expect.
//
// `ProducerChain` tries the model first when one is configured and falls
// back to the algorithmic producer on any `ProducerError`. The two never run
// at the same time and their outputs are never merged. Whatever candidate
// comes out is validated; a validation failure is returned as-is, not
// retried with the next producer.

use crate::error::{ProducerError, ValidationError};
use crate::generator::{BASE_DURATION, SEED_MOTIF, generate};
use crate::scale::Scale;
use crate::sequence::{NoteSequence, QuantizationInfo, RawNote, RawNoteSequence};
use crate::validate::validate;
use ai_piano_prng::RandomSource;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::process::{Command, Stdio};

/// Steps per quarter note of the seed handed to an external model.
const MODEL_SEED_STEPS_PER_QUARTER: u32 = 4;

/// Parameters of one generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Randomness factor (temperature), nominally in [0.1, 2.0].
    pub randomness: f64,
    /// Notes to generate after the seed motif.
    pub steps: usize,
    pub scale: Scale,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        GenerationRequest {
            randomness: 1.0,
            steps: 32,
            scale: Scale::Pentatonic,
        }
    }
}

/// Something that can propose a note sequence for a request.
pub trait SequenceProducer {
    /// Short name used in log messages.
    fn name(&self) -> &str;

    fn produce(&mut self, request: &GenerationRequest) -> Result<RawNoteSequence, ProducerError>;
}

/// The scale-walk generator behind the producer interface.
#[derive(Debug, Clone)]
pub struct AlgorithmicProducer<R> {
    rng: R,
}

impl<R: RandomSource> AlgorithmicProducer<R> {
    pub fn new(rng: R) -> Self {
        AlgorithmicProducer { rng }
    }

    /// Generate directly, skipping the raw form.
    pub fn generate(&mut self, request: &GenerationRequest) -> NoteSequence {
        generate(request.randomness, request.steps, request.scale, &mut self.rng)
    }
}

impl<R: RandomSource> SequenceProducer for AlgorithmicProducer<R> {
    fn name(&self) -> &str {
        "algorithmic"
    }

    fn produce(&mut self, request: &GenerationRequest) -> Result<RawNoteSequence, ProducerError> {
        Ok(RawNoteSequence::from(&self.generate(request)))
    }
}

/// What an external model reads on stdin.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRequest {
    pub seed: RawNoteSequence,
    pub steps: usize,
    pub temperature: f64,
}

impl ModelRequest {
    pub fn new(request: &GenerationRequest) -> Self {
        let notes = SEED_MOTIF
            .iter()
            .enumerate()
            .map(|(i, &pitch)| {
                RawNote::new(
                    pitch,
                    i as f64 * BASE_DURATION,
                    (i + 1) as f64 * BASE_DURATION,
                )
            })
            .collect();
        ModelRequest {
            seed: RawNoteSequence {
                notes,
                total_time: Some(SEED_MOTIF.len() as f64 * BASE_DURATION),
                quantization_info: Some(QuantizationInfo {
                    steps_per_quarter: Some(MODEL_SEED_STEPS_PER_QUARTER),
                }),
                ..Default::default()
            },
            steps: request.steps,
            temperature: request.randomness,
        }
    }
}

/// A sequence model running as a child process.
///
/// The process gets one JSON `ModelRequest` on stdin and must print one JSON
/// note sequence on stdout, then exit successfully.
#[derive(Debug, Clone)]
pub struct ExternalModelProducer {
    program: String,
    args: Vec<String>,
    label: String,
}

impl ExternalModelProducer {
    /// `command[0]` is the program, the rest are its arguments.
    pub fn new(command: &[String]) -> Result<Self, ProducerError> {
        let (program, args) = command.split_first().ok_or(ProducerError::NoCommand)?;
        Ok(ExternalModelProducer {
            program: program.clone(),
            args: args.to_vec(),
            label: command.join(" "),
        })
    }
}

impl SequenceProducer for ExternalModelProducer {
    fn name(&self) -> &str {
        &self.label
    }

    fn produce(&mut self, request: &GenerationRequest) -> Result<RawNoteSequence, ProducerError> {
        let input = serde_json::to_vec(&ModelRequest::new(request))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ProducerError::Spawn {
                command: self.label.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&input)?;
        }
        let output = child.wait_with_output()?;

        if !output.status.success() {
            return Err(ProducerError::Exited {
                command: self.label.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

/// A validated sequence and the producer that made it.
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub sequence: NoteSequence,
    pub producer: String,
}

/// Optional model producer, then the algorithmic producer.
pub struct ProducerChain<R> {
    model: Option<Box<dyn SequenceProducer>>,
    algorithmic: AlgorithmicProducer<R>,
}

impl<R: RandomSource> ProducerChain<R> {
    pub fn new(algorithmic: AlgorithmicProducer<R>) -> Self {
        ProducerChain {
            model: None,
            algorithmic,
        }
    }

    /// Try `model` before the algorithmic producer.
    pub fn with_model(mut self, model: impl SequenceProducer + 'static) -> Self {
        self.model = Some(Box::new(model));
        self
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Produce a candidate and validate it.
    pub fn compose(&mut self, request: &GenerationRequest) -> Result<Composition, ValidationError> {
        let (raw, producer) = self.produce_candidate(request);
        let sequence = validate(&raw).inspect_err(|e| {
            log::warn!("sequence from {producer} failed validation: {e}");
        })?;
        log::info!(
            "{producer} produced {} notes, {:.2}s",
            sequence.notes.len(),
            sequence.total_time
        );
        Ok(Composition { sequence, producer })
    }

    fn produce_candidate(&mut self, request: &GenerationRequest) -> (RawNoteSequence, String) {
        if let Some(model) = self.model.as_mut() {
            match model.produce(request) {
                Ok(raw) => return (raw, model.name().to_string()),
                Err(e) => log::warn!(
                    "model '{}' failed, falling back to algorithmic generation: {e}",
                    model.name()
                ),
            }
        }
        let raw = RawNoteSequence::from(&self.algorithmic.generate(request));
        (raw, self.algorithmic.name().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ai_piano_prng::MelodyRng;

    struct Failing;

    impl SequenceProducer for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn produce(&mut self, _: &GenerationRequest) -> Result<RawNoteSequence, ProducerError> {
            Err(ProducerError::NoCommand)
        }
    }

    struct Fixed(RawNoteSequence);

    impl SequenceProducer for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn produce(&mut self, _: &GenerationRequest) -> Result<RawNoteSequence, ProducerError> {
            Ok(self.0.clone())
        }
    }

    fn chain(seed: u64) -> ProducerChain<MelodyRng> {
        ProducerChain::new(AlgorithmicProducer::new(MelodyRng::new(seed)))
    }

    fn one_note() -> RawNoteSequence {
        RawNoteSequence {
            notes: vec![RawNote::new(62, 0.0, 1.0)],
            ..Default::default()
        }
    }

    #[test]
    fn algorithmic_only_chain() {
        let request = GenerationRequest {
            steps: 12,
            ..Default::default()
        };
        let mut chain = chain(8);
        assert!(!chain.has_model());
        let composition = chain.compose(&request).unwrap();
        assert_eq!(composition.producer, "algorithmic");
        assert_eq!(composition.sequence.notes.len(), 16);
    }

    #[test]
    fn model_output_is_preferred() {
        let mut chain = chain(1).with_model(Fixed(one_note()));
        let composition = chain.compose(&GenerationRequest::default()).unwrap();
        assert_eq!(composition.producer, "fixed");
        assert_eq!(composition.sequence.notes.len(), 1);
        assert_eq!(composition.sequence.notes[0].velocity, 80);
    }

    #[test]
    fn model_failure_falls_back() {
        let request = GenerationRequest {
            steps: 3,
            ..Default::default()
        };
        let composition = chain(4).with_model(Failing).compose(&request).unwrap();
        assert_eq!(composition.producer, "algorithmic");

        // Same seed without the model gives the same melody.
        let plain = chain(4).compose(&request).unwrap();
        assert_eq!(composition.sequence, plain.sequence);
    }

    #[test]
    fn invalid_model_output_is_surfaced() {
        let mut quantized = one_note();
        quantized.quantization_info = Some(QuantizationInfo::default());
        let err = chain(1)
            .with_model(Fixed(quantized))
            .compose(&GenerationRequest::default())
            .unwrap_err();
        assert_eq!(err, ValidationError::Quantized);
    }

    #[test]
    fn model_request_carries_quantized_seed() {
        let request = GenerationRequest {
            randomness: 1.5,
            steps: 20,
            scale: Scale::Major,
        };
        let json = serde_json::to_value(ModelRequest::new(&request)).unwrap();
        assert_eq!(json["steps"], 20);
        assert_eq!(json["temperature"], 1.5);
        assert_eq!(json["seed"]["totalTime"], 2.0);
        assert_eq!(json["seed"]["quantizationInfo"]["stepsPerQuarter"], 4);
        let pitches: Vec<u64> = json["seed"]["notes"]
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["pitch"].as_u64().unwrap())
            .collect();
        assert_eq!(pitches, vec![60, 64, 67, 72]);
        assert_eq!(json["seed"]["notes"][3]["startTime"], 1.5);
    }

    #[test]
    fn empty_model_command_is_rejected() {
        assert!(matches!(
            ExternalModelProducer::new(&[]),
            Err(ProducerError::NoCommand)
        ));
    }

    #[test]
    fn missing_model_program_fails_to_spawn() {
        let mut model =
            ExternalModelProducer::new(&["ai-piano-no-such-model-binary".to_string()]).unwrap();
        let err = model.produce(&GenerationRequest::default()).unwrap_err();
        assert!(matches!(err, ProducerError::Spawn { .. }), "{err}");
    }

    #[cfg(unix)]
    fn sh(script: &str) -> ExternalModelProducer {
        ExternalModelProducer::new(&["sh".to_string(), "-c".to_string(), script.to_string()])
            .unwrap()
    }

    #[cfg(unix)]
    #[test]
    fn external_model_output_is_parsed() {
        let mut model = sh(
            r#"cat > /dev/null; echo '{"notes":[{"pitch":62,"startTime":0.0,"endTime":1.0}],"totalTime":1.0}'"#,
        );
        let raw = model.produce(&GenerationRequest::default()).unwrap();
        assert_eq!(raw.notes, one_note().notes);
        assert_eq!(raw.total_time, Some(1.0));
    }

    #[cfg(unix)]
    #[test]
    fn external_model_exit_status_is_an_error() {
        let mut model = sh("cat > /dev/null; echo 'no checkpoint' >&2; exit 3");
        match model.produce(&GenerationRequest::default()) {
            Err(ProducerError::Exited { stderr, status, .. }) => {
                assert_eq!(stderr, "no checkpoint");
                assert!(!status.success());
            }
            other => panic!("expected exit error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn external_model_garbage_falls_back() {
        let model = sh("cat > /dev/null; echo 'not json'");
        let composition = chain(2)
            .with_model(model)
            .compose(&GenerationRequest::default())
            .unwrap();
        assert_eq!(composition.producer, "algorithmic");
    }
}
