//! Daemon configuration, loaded from a TOML file and validated before
//! anything touches the camera or the controller.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use turngate_core::zone::{FractionalRect, ZoneMode};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config unreadable: {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("config malformed: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub camera: CameraConfig,
    pub recognition: RecognitionConfig,
    pub zones: ZonesConfig,
    pub turnstile: TurnstileConfig,
    pub roster: RosterConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CameraConfig {
    /// V4L2 device path (e.g. "/dev/video0").
    pub device: String,
}

/// Which face engine profile to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Arcface,
    Facenet,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecognitionConfig {
    pub backend: Backend,
    pub detector_model: PathBuf,
    pub embedding_model: PathBuf,
    /// Directory of per-id embedding files written by enrollment.
    pub embeddings_dir: PathBuf,
    /// Maximum embedding distance for a positive match (strictly below).
    pub threshold: f32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZonesConfig {
    pub mode: ZoneMode,
    /// Exit-side zone, fractions of frame size.
    pub exit: FractionalRect,
    /// Entrance-side zone, fractions of frame size.
    pub entrance: FractionalRect,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TurnstileConfig {
    /// Controller base URL (e.g. "http://192.168.1.10").
    pub host: String,
    pub device_id: u32,
    pub login: String,
    pub password: String,
    /// Minimum re-trigger interval for the same user, seconds.
    pub min_time_diff_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum RosterConfig {
    /// Tabular `id,name` file.
    File {
        path: PathBuf,
        #[serde(default = "default_unknown_name")]
        unknown_name: String,
    },
    /// The controller's staff list endpoint.
    Remote {
        #[serde(default = "default_unknown_name")]
        unknown_name: String,
    },
}

impl RosterConfig {
    pub fn unknown_name(&self) -> &str {
        match self {
            RosterConfig::File { unknown_name, .. } | RosterConfig::Remote { unknown_name } => {
                unknown_name
            }
        }
    }
}

fn default_unknown_name() -> String {
    "Unknown".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    /// Capture attempts before the source is treated as unavailable.
    pub retry_attempts: u32,
    /// Delay between capture attempts, milliseconds.
    pub retry_delay_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 5,
            retry_delay_ms: 200,
        }
    }
}

/// Read and validate the config file. A config that fails validation is
/// rejected whole; nothing is partially applied.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: Config = toml::from_str(&raw)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.recognition.threshold <= 0.0 {
        return Err(ConfigError::Invalid(format!(
            "recognition.threshold must be positive, got {}",
            config.recognition.threshold
        )));
    }
    if !config.zones.exit.in_bounds() {
        return Err(ConfigError::Invalid(
            "zones.exit must lie within the unit square".to_string(),
        ));
    }
    if !config.zones.entrance.in_bounds() {
        return Err(ConfigError::Invalid(
            "zones.entrance must lie within the unit square".to_string(),
        ));
    }
    if config.capture.retry_attempts == 0 {
        return Err(ConfigError::Invalid(
            "capture.retry_attempts must be at least 1".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [camera]
        device = "/dev/video0"

        [recognition]
        backend = "facenet"
        detector_model = "/var/lib/turngate/models/face_det.onnx"
        embedding_model = "/var/lib/turngate/models/facenet.onnx"
        embeddings_dir = "/var/lib/turngate/embeddings"
        threshold = 0.6

        [zones]
        mode = "center"
        exit = { x = 0.0, y = 0.2, w = 0.3, h = 0.6 }
        entrance = { x = 0.7, y = 0.2, w = 0.3, h = 0.6 }

        [turnstile]
        host = "http://192.168.1.10"
        device_id = 7
        login = "api"
        password = "secret"
        min_time_diff_secs = 5

        [roster]
        source = "remote"
    "#;

    fn parse(raw: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(raw)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_sample_config_parses() {
        let config = parse(SAMPLE).unwrap();
        assert_eq!(config.camera.device, "/dev/video0");
        assert_eq!(config.recognition.backend, Backend::Facenet);
        assert_eq!(config.zones.mode, ZoneMode::Center);
        assert_eq!(config.turnstile.device_id, 7);
        assert_eq!(config.roster.unknown_name(), "Unknown");
        // Defaults applied where the file is silent.
        assert_eq!(config.capture.retry_attempts, 5);
        assert_eq!(config.turnstile.request_timeout_secs, 5);
    }

    #[test]
    fn test_file_roster_source() {
        let raw = SAMPLE.replace(
            "source = \"remote\"",
            "source = \"file\"\npath = \"/etc/turngate/staff.csv\"\nunknown_name = \"Guest\"",
        );
        let config = parse(&raw).unwrap();
        match &config.roster {
            RosterConfig::File { path, unknown_name } => {
                assert_eq!(path, &PathBuf::from("/etc/turngate/staff.csv"));
                assert_eq!(unknown_name, "Guest");
            }
            other => panic!("expected file roster, got {other:?}"),
        }
    }

    #[test]
    fn test_zone_outside_unit_square_rejected() {
        let raw = SAMPLE.replace(
            "exit = { x = 0.0, y = 0.2, w = 0.3, h = 0.6 }",
            "exit = { x = 0.8, y = 0.2, w = 0.3, h = 0.6 }",
        );
        assert!(matches!(parse(&raw), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_nonpositive_threshold_rejected() {
        let raw = SAMPLE.replace("threshold = 0.6", "threshold = 0.0");
        assert!(matches!(parse(&raw), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let raw = SAMPLE.replace("[camera]", "[camera]\nbrightness = 3");
        assert!(matches!(parse(&raw), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load(Path::new("/nonexistent/turngate.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
