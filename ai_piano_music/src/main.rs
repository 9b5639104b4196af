// AI Piano melody generator, CLI entry point.
//
// Generates a short piano melody and writes it to a MIDI file named
// `ai-piano-music-<epoch-ms>.mid`. The pipeline: config → producer chain
// (external model if configured, else the scale walk) → validation → MIDI
// (+ optional SVG piano roll and JSON dump).
//
// Usage:
//   cargo run -p ai_piano_music -- [--config FILE] [--randomness F] [--steps N]
//     [--scale major|pentatonic] [--seed N] [--model-command CMD ARGS...]
//     [--out-dir DIR] [--svg] [--json]
//
// Logging goes through env_logger; set RUST_LOG=debug to see each walk step.

use ai_piano_music::config::GeneratorConfig;
use ai_piano_music::midi::{export_file_name, write_midi};
use ai_piano_music::piano_roll::render_svg;
use ai_piano_music::producer::{AlgorithmicProducer, ExternalModelProducer, ProducerChain};
use ai_piano_music::scale::Scale;
use ai_piano_prng::MelodyRng;
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug, Default)]
#[command(
    name = "generate",
    version,
    about = "Generate a short piano melody and write it as a MIDI file"
)]
struct Cli {
    /// JSON config file. Flags given on the command line override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Randomness factor (temperature), clamped to 0.1..=2.0
    #[arg(short, long)]
    randomness: Option<f64>,

    /// Notes to generate after the four-note seed motif
    #[arg(short, long)]
    steps: Option<usize>,

    /// Scale to walk over: major or pentatonic
    #[arg(long)]
    scale: Option<Scale>,

    /// RNG seed (same seed => same melody)
    #[arg(long)]
    seed: Option<u64>,

    /// External model command to try before algorithmic generation
    #[arg(long, num_args = 1..)]
    model_command: Option<Vec<String>>,

    /// Directory to write output files to
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Also write an SVG piano roll next to the MIDI file
    #[arg(long)]
    svg: bool,

    /// Also write the validated note sequence as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// Load the config file (if any) and apply the command-line overrides.
    fn resolve_config(&self) -> anyhow::Result<GeneratorConfig> {
        let mut config = match &self.config {
            Some(path) => GeneratorConfig::load(path)?,
            None => GeneratorConfig::default(),
        };
        if let Some(randomness) = self.randomness {
            config.randomness = randomness;
        }
        if let Some(steps) = self.steps {
            config.steps = steps;
        }
        if let Some(scale) = self.scale {
            config.scale = scale;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(command) = &self.model_command {
            config.model_command = command.clone();
        }
        if let Some(dir) = &self.out_dir {
            config.output_dir = dir.clone();
        }
        Ok(config)
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(&Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = cli.resolve_config()?;

    let (rng, seed) = match config.seed {
        Some(seed) => (MelodyRng::new(seed), seed),
        None => MelodyRng::from_entropy().context("failed to seed the random generator")?,
    };
    log::info!(
        "randomness {}, {} steps, {} scale, seed {seed}",
        config.randomness,
        config.steps,
        config.scale
    );

    let mut chain = ProducerChain::new(AlgorithmicProducer::new(rng));
    if !config.model_command.is_empty() {
        chain = chain.with_model(ExternalModelProducer::new(&config.model_command)?);
    }

    let composition = chain
        .compose(&config.request())
        .context("Failed to generate music")?;
    let seq = &composition.sequence;

    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            config.output_dir.display()
        )
    })?;
    let midi_path = config
        .output_dir
        .join(export_file_name(chrono::Utc::now().timestamp_millis()));

    write_midi(seq, &midi_path)
        .with_context(|| format!("Failed to write MIDI file {}", midi_path.display()))?;
    println!(
        "Wrote {} notes ({:.1}s, from {}) to {}",
        seq.notes.len(),
        seq.total_time,
        composition.producer,
        midi_path.display()
    );

    if cli.svg {
        let svg_path = midi_path.with_extension("svg");
        let svg = render_svg(seq, config.piano_roll_width, config.piano_roll_height);
        std::fs::write(&svg_path, svg)
            .with_context(|| format!("failed to write {}", svg_path.display()))?;
        println!("Piano roll: {}", svg_path.display());
    }

    if cli.json {
        let json_path = midi_path.with_extension("json");
        let json = serde_json::to_string_pretty(seq)?;
        std::fs::write(&json_path, json)
            .with_context(|| format!("failed to write {}", json_path.display()))?;
        println!("Sequence: {}", json_path.display());
    }

    Ok(())
}
