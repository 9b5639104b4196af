// Generator configuration.
//
// A `GeneratorConfig` can be loaded from a JSON file; every field is
// optional there and falls back to the default. The CLI loads the file (if
// given) and then applies its own flags on top.
//
// Example:
//   { "randomness": 1.4, "steps": 64, "scale": "major", "seed": 7,
//     "model_command": ["python3", "continue.py"], "output_dir": "out" }

use crate::error::ConfigError;
use crate::piano_roll::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::producer::GenerationRequest;
use crate::scale::Scale;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Randomness factor (temperature), clamped to [0.1, 2.0] at generation.
    pub randomness: f64,
    /// Notes to generate after the seed motif.
    pub steps: usize,
    pub scale: Scale,
    /// Fixed seed for reproducible output. None draws one from the OS.
    pub seed: Option<u64>,
    /// External model to try first (program followed by arguments).
    /// Empty means algorithmic generation only.
    pub model_command: Vec<String>,
    /// Directory the .mid (and optional .svg/.json) files are written to.
    pub output_dir: PathBuf,
    pub piano_roll_width: f64,
    pub piano_roll_height: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        let request = GenerationRequest::default();
        GeneratorConfig {
            randomness: request.randomness,
            steps: request.steps,
            scale: request.scale,
            seed: None,
            model_command: Vec::new(),
            output_dir: PathBuf::from("."),
            piano_roll_width: DEFAULT_WIDTH,
            piano_roll_height: DEFAULT_HEIGHT,
        }
    }
}

impl GeneratorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn request(&self) -> GenerationRequest {
        GenerationRequest {
            randomness: self.randomness,
            steps: self.steps,
            scale: self.scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = GeneratorConfig::default();
        assert_eq!(config.randomness, 1.0);
        assert_eq!(config.steps, 32);
        assert_eq!(config.scale, Scale::Pentatonic);
        assert_eq!(config.seed, None);
        assert!(config.model_command.is_empty());
        assert_eq!(config.piano_roll_height, 300.0);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: GeneratorConfig =
            serde_json::from_str(r#"{"steps": 8, "scale": "major", "seed": 5}"#).unwrap();
        assert_eq!(config.steps, 8);
        assert_eq!(config.scale, Scale::Major);
        assert_eq!(config.seed, Some(5));
        assert_eq!(config.randomness, 1.0);
        assert_eq!(config.output_dir, PathBuf::from("."));
    }

    #[test]
    fn request_mirrors_config() {
        let config = GeneratorConfig {
            randomness: 1.8,
            steps: 3,
            scale: Scale::Major,
            ..Default::default()
        };
        assert_eq!(
            config.request(),
            GenerationRequest {
                randomness: 1.8,
                steps: 3,
                scale: Scale::Major,
            }
        );
    }

    #[test]
    fn load_reports_missing_and_malformed_files() {
        let dir = std::env::temp_dir().join(format!("ai-piano-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let missing = dir.join("missing.json");
        assert!(matches!(
            GeneratorConfig::load(&missing),
            Err(ConfigError::Read { .. })
        ));

        let bad = dir.join("bad.json");
        std::fs::write(&bad, "{ steps: ").unwrap();
        assert!(matches!(
            GeneratorConfig::load(&bad),
            Err(ConfigError::Parse { .. })
        ));

        let good = dir.join("good.json");
        std::fs::write(&good, r#"{"randomness": 0.5, "model_command": ["model"]}"#).unwrap();
        let config = GeneratorConfig::load(&good).unwrap();
        assert_eq!(config.randomness, 0.5);
        assert_eq!(config.model_command, vec!["model".to_string()]);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
