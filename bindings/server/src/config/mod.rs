//! Environment-backed configuration.
//!
//! Every setting except the detector model has a default. Override with
//! `FACEMATCH_*` environment variables.

pub mod error;


pub use error::{ConfigError, PathProblem};

use std::env;
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use facematch::{MatchPolarity, DEFAULT_MIN_FACE_SIZE, DEFAULT_THRESHOLD};

/// Default request body ceiling: 16 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Server configuration loaded from environment variables.
///
/// Use [`ServerConfig::from_env`] to read `FACEMATCH_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP server port. Default: `5000`.
    pub port: u16,

    /// IP address to bind to. Default: `0.0.0.0`.
    pub bind_addr: IpAddr,

    /// Directory for request-scoped uploads and crops. Default: `./uploads`.
    pub scratch_dir: PathBuf,

    /// SeetaFace detection model. Required.
    pub detector_model: Option<PathBuf>,

    /// ONNX face-embedding model. Without one the pixel embedder is used.
    pub embedder_model: Option<PathBuf>,

    /// Decision threshold. Default: `0.55`.
    pub threshold: f32,

    /// Which side of the threshold verifies. Default: `at-most`.
    pub polarity: MatchPolarity,

    /// Smallest accepted face side, in pixels. Default: `50`.
    pub min_face_size: u32,

    /// Request body ceiling in bytes. Default: 16 MiB.
    pub max_body_bytes: usize,

    /// Keep face crops in scratch storage. Default: `true`.
    pub persist_crops: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            scratch_dir: PathBuf::from("./uploads"),
            detector_model: None,
            embedder_model: None,
            threshold: DEFAULT_THRESHOLD,
            polarity: MatchPolarity::default(),
            min_face_size: DEFAULT_MIN_FACE_SIZE,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            persist_crops: true,
        }
    }
}

impl ServerConfig {
    const ENV_PORT: &'static str = "FACEMATCH_PORT";
    const ENV_BIND_ADDR: &'static str = "FACEMATCH_BIND_ADDR";
    const ENV_SCRATCH_DIR: &'static str = "FACEMATCH_SCRATCH_DIR";
    const ENV_DETECTOR_MODEL: &'static str = "FACEMATCH_DETECTOR_MODEL";
    const ENV_EMBEDDER_MODEL: &'static str = "FACEMATCH_EMBEDDER_MODEL";
    const ENV_THRESHOLD: &'static str = "FACEMATCH_THRESHOLD";
    const ENV_POLARITY: &'static str = "FACEMATCH_POLARITY";
    const ENV_MIN_FACE_SIZE: &'static str = "FACEMATCH_MIN_FACE_SIZE";
    const ENV_MAX_BODY_BYTES: &'static str = "FACEMATCH_MAX_BODY_BYTES";
    const ENV_PERSIST_CROPS: &'static str = "FACEMATCH_PERSIST_CROPS";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            port: Self::parse_port_from_env(defaults.port)?,
            bind_addr: Self::parse_from_env(Self::ENV_BIND_ADDR, defaults.bind_addr)?,
            scratch_dir: Self::parse_path_from_env(Self::ENV_SCRATCH_DIR, defaults.scratch_dir),
            detector_model: Self::parse_optional_path_from_env(Self::ENV_DETECTOR_MODEL),
            embedder_model: Self::parse_optional_path_from_env(Self::ENV_EMBEDDER_MODEL),
            threshold: Self::parse_from_env(Self::ENV_THRESHOLD, defaults.threshold)?,
            polarity: Self::parse_from_env(Self::ENV_POLARITY, defaults.polarity)?,
            min_face_size: Self::parse_from_env(Self::ENV_MIN_FACE_SIZE, defaults.min_face_size)?,
            max_body_bytes: Self::parse_from_env(
                Self::ENV_MAX_BODY_BYTES,
                defaults.max_body_bytes,
            )?,
            persist_crops: Self::parse_bool_from_env(
                Self::ENV_PERSIST_CROPS,
                defaults.persist_crops,
            )?,
        })
    }

    /// Validates paths and numeric ranges (does not create directories).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scratch_dir.exists() && !self.scratch_dir.is_dir() {
            return Err(ConfigError::UnusablePath {
                name: Self::ENV_SCRATCH_DIR,
                path: self.scratch_dir.clone(),
                problem: PathProblem::NotADirectory,
            });
        }

        let detector_model = self.detector_model.as_deref().ok_or(ConfigError::Missing {
            name: Self::ENV_DETECTOR_MODEL,
        })?;
        Self::require_file(Self::ENV_DETECTOR_MODEL, detector_model)?;

        if let Some(ref path) = self.embedder_model {
            Self::require_file(Self::ENV_EMBEDDER_MODEL, path)?;
        }

        if !self.threshold.is_finite() {
            return Err(ConfigError::InvalidValue {
                name: Self::ENV_THRESHOLD,
                value: self.threshold.to_string(),
                reason: "must be a finite number".to_string(),
            });
        }

        for (name, value) in [
            (Self::ENV_MIN_FACE_SIZE, self.min_face_size as usize),
            (Self::ENV_MAX_BODY_BYTES, self.max_body_bytes),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    name,
                    value: "0".to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Returns `"{bind_addr}:{port}"` (useful for logging/binding).
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    fn require_file(name: &'static str, path: &Path) -> Result<(), ConfigError> {
        let problem = if !path.exists() {
            PathProblem::Missing
        } else if !path.is_file() {
            PathProblem::NotAFile
        } else {
            return Ok(());
        };
        Err(ConfigError::UnusablePath {
            name,
            path: path.to_path_buf(),
            problem,
        })
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match Self::parse_from_env(Self::ENV_PORT, default)? {
            0 => Err(ConfigError::InvalidValue {
                name: Self::ENV_PORT,
                value: "0".to_string(),
                reason: "must be between 1 and 65535".to_string(),
            }),
            port => Ok(port),
        }
    }

    fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
        env::var(var_name).map(PathBuf::from).unwrap_or(default)
    }

    fn parse_optional_path_from_env(var_name: &str) -> Option<PathBuf> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    fn parse_from_env<T>(var_name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match env::var(var_name) {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidValue {
                    name: var_name,
                    reason: e.to_string(),
                    value,
                }),
            Err(_) => Ok(default),
        }
    }

    fn parse_bool_from_env(var_name: &'static str, default: bool) -> Result<bool, ConfigError> {
        match env::var(var_name) {
            Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::InvalidValue {
                    name: var_name,
                    value,
                    reason: "expected true or false".to_string(),
                }),
            },
            Err(_) => Ok(default),
        }
    }
}
