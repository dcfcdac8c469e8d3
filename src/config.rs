//! Configuration management for the judge and the extractor.
//!
//! JSON files with per-field defaults, so a missing file or a partial file is
//! always usable. Durations are written as human strings ("15s", "500ms", "2m").

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::extract::{Alphabet, ExtractError, ExtractOptions, DEFAULT_MAX_LENGTH};
use crate::judge::{DEFAULT_COMPILE_TIMEOUT, DEFAULT_MAX_REQUEST_BYTES};
use crate::payload::{Templates, DEFAULT_CACHE_CAPACITY};

/// Error types for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("Invalid prefix {0:?}: must be a C identifier")]
    InvalidPrefix(String),

    #[error("Invalid include name {0:?}")]
    InvalidInclude(String),

    #[error("{0} must be > 0")]
    Zero(&'static str),

    #[error("Invalid alphabet: {0}")]
    InvalidAlphabet(String),
}

/// Helper trait for loading/saving configuration files.
pub trait FileConfig: Serialize + for<'de> Deserialize<'de> + Default + Sized {
    /// Load configuration from a JSON file.
    ///
    /// If the file doesn't exist, returns default config.
    /// If the file exists but is invalid, returns an error.
    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        // Atomic write: write to temp file first, then rename
        let temp_path = path.as_ref().with_extension("tmp");
        std::fs::write(&temp_path, content)?;
        std::fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<(), ConfigError>;

    fn log_level(&self) -> &str;

    /// Get tracing::Level from log_level string.
    fn log_level_as_tracing(&self) -> tracing::Level {
        match self.log_level().to_lowercase().as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "info" => tracing::Level::INFO,
            "warn" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => tracing::Level::INFO,
        }
    }
}

/// Judge service configuration loaded from JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeFileConfig {
    /// Listen address (e.g., "0.0.0.0:8011")
    pub listen_addr: String,

    /// Compiler binary
    pub compiler: PathBuf,

    /// Directory holding the protected file; the compiler runs there
    pub protected_dir: PathBuf,

    /// Wall-clock budget per compilation (e.g., "15s")
    #[serde(with = "duration_serde")]
    pub compile_timeout: Duration,

    /// Cap on the base64 request line
    pub max_request_bytes: usize,

    /// Log level: "trace", "debug", "info", "warn", "error"
    pub log_level: String,
}

impl Default for JudgeFileConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8011".to_string(),
            compiler: PathBuf::from("/usr/bin/clang"),
            protected_dir: PathBuf::from("."),
            compile_timeout: DEFAULT_COMPILE_TIMEOUT,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            log_level: "info".to_string(),
        }
    }
}

impl FileConfig for JudgeFileConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        validate_log_level(&self.log_level)?;
        if self.compile_timeout.is_zero() {
            return Err(ConfigError::Zero("compile_timeout"));
        }
        if self.compile_timeout.as_secs() > 300 {
            return Err(ConfigError::InvalidTimeout(
                "compile_timeout too long (max 300s)".to_string(),
            ));
        }
        if self.max_request_bytes == 0 {
            return Err(ConfigError::Zero("max_request_bytes"));
        }
        Ok(())
    }

    fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Extractor configuration loaded from JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractFileConfig {
    /// Judge address (e.g., "127.0.0.1:8011")
    pub judge_addr: String,

    /// Identifier that opens the protected file's content
    pub prefix: String,

    /// Name of the protected file as seen by `#include`
    pub include: String,

    /// Candidate characters in scan order; default is letters, digits, punctuation
    pub alphabet: Option<String>,

    /// Give up on length discovery past this many bytes
    pub max_length: usize,

    /// Scan the whole alphabet and fail on a second crossing
    pub strict: bool,

    /// Fragment memoization bound
    pub cache_capacity: usize,

    /// Log level: "trace", "debug", "info", "warn", "error"
    pub log_level: String,
}

impl Default for ExtractFileConfig {
    fn default() -> Self {
        Self {
            judge_addr: "127.0.0.1:8011".to_string(),
            prefix: "hxp".to_string(),
            include: "flag".to_string(),
            alphabet: None,
            max_length: DEFAULT_MAX_LENGTH,
            strict: false,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            log_level: "info".to_string(),
        }
    }
}

impl ExtractFileConfig {
    pub fn templates(&self) -> Templates {
        Templates::new(self.prefix.clone(), self.include.clone())
    }

    pub fn options(&self) -> Result<ExtractOptions, ConfigError> {
        let alphabet = match &self.alphabet {
            Some(chars) => Alphabet::new(chars).map_err(|e| match e {
                ExtractError::InvalidAlphabet(msg) => ConfigError::InvalidAlphabet(msg),
                other => ConfigError::InvalidAlphabet(other.to_string()),
            })?,
            None => Alphabet::printable(),
        };
        Ok(ExtractOptions {
            alphabet,
            max_length: self.max_length,
            strict: self.strict,
        })
    }
}

impl FileConfig for ExtractFileConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        validate_log_level(&self.log_level)?;
        if !is_c_identifier(&self.prefix) {
            return Err(ConfigError::InvalidPrefix(self.prefix.clone()));
        }
        if self.include.is_empty()
            || self
                .include
                .chars()
                .any(|c| matches!(c, '"' | '\n' | '\r' | '\\') || crate::protocol::STRUCTURAL_CHARS.contains(&c))
        {
            return Err(ConfigError::InvalidInclude(self.include.clone()));
        }
        if self.max_length == 0 {
            return Err(ConfigError::Zero("max_length"));
        }
        self.options()?;
        Ok(())
    }

    fn log_level(&self) -> &str {
        &self.log_level
    }
}

fn validate_log_level(log_level: &str) -> Result<(), ConfigError> {
    match log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::InvalidLogLevel(log_level.to_string())),
    }
}

fn is_c_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Module for Duration serialization/deserialization.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let secs = duration.as_secs();
        let millis = duration.subsec_millis();
        if secs >= 1 && millis == 0 {
            serializer.serialize_str(&format!("{}s", secs))
        } else if secs >= 1 {
            serializer.serialize_str(&format!("{}.{:03}s", secs, millis))
        } else if millis >= 1 {
            serializer.serialize_str(&format!("{}ms", millis))
        } else {
            serializer.serialize_str("0s")
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim().to_lowercase();
        if let Some(num) = s.strip_suffix("ms") {
            let millis: u64 = num
                .trim()
                .parse()
                .map_err(|_| format!("invalid milliseconds: {}", num))?;
            return Ok(Duration::from_millis(millis));
        }
        if let Some(num) = s.strip_suffix('s') {
            let num = num.trim();
            if let Some((whole, frac)) = num.split_once('.') {
                let secs: u64 = whole
                    .parse()
                    .map_err(|_| format!("invalid seconds: {}", whole))?;
                let millis_str = format!("{:0<3}", &frac[..3.min(frac.len())]);
                let millis: u32 = millis_str
                    .parse()
                    .map_err(|_| format!("invalid milliseconds: {}", millis_str))?;
                return Ok(Duration::new(secs, millis * 1_000_000));
            }
            let secs: u64 = num
                .parse()
                .map_err(|_| format!("invalid duration: {}", s))?;
            return Ok(Duration::from_secs(secs));
        }
        if let Some(num) = s.strip_suffix('m') {
            let mins: u64 = num
                .trim()
                .parse()
                .map_err(|_| format!("invalid minutes: {}", num))?;
            return Ok(Duration::from_secs(mins * 60));
        }
        Err(format!("unknown duration format: {}", s))
    }
}
