//! Settings loading with file and environment precedence.
//!
//! [`Settings`] is the on-disk/environment representation of the defaults that
//! feed [`SessionOptions`](crate::config::SessionOptions). The precedence
//! chain is: defaults, then configuration file (TOML or JSON), then
//! `MEETBOT_*` environment variables, then CLI arguments (applied in the
//! binary).

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::SessionOptions;

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML configuration.
    #[error("Failed to parse TOML configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),

    /// Failed to parse JSON configuration.
    #[error("Failed to parse JSON configuration: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// Unsupported file format.
    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

/// Durable configuration, loaded from file and environment.
///
/// All fields are optional; missing fields fall back to the
/// [`SessionOptions`] defaults when converted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Provider account email.
    pub email: Option<String>,

    /// Provider account password.
    pub password: Option<String>,

    /// Guest display name.
    pub guest_name: Option<String>,

    /// Recording output directory.
    pub recording_dir: Option<PathBuf>,

    /// Desired in-meeting camera state.
    pub camera_enabled: Option<bool>,

    /// Desired in-meeting microphone state.
    pub mic_enabled: Option<bool>,

    /// Headless browser mode.
    pub headless: Option<bool>,

    /// Browser executable path.
    pub executable_path: Option<PathBuf>,

    /// Browser profile directory.
    pub user_data_dir: Option<PathBuf>,

    /// Extra browser launch arguments.
    #[serde(default)]
    pub additional_args: Vec<String>,

    /// Realistic pointer/keyboard simulation.
    pub use_realistic_movements: Option<bool>,

    /// Viewport randomization.
    pub randomize_viewport: Option<bool>,

    /// Join-control wait budget in milliseconds.
    pub join_timeout_ms: Option<u64>,

    /// Admission-confirmation wait budget in milliseconds.
    pub admission_timeout_ms: Option<u64>,
}

impl Settings {
    /// Loads settings from a configuration file.
    ///
    /// The format is determined by the file extension (`.toml` or `.json`).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "toml" => Ok(toml::from_str(&content)?),
            "json" => Ok(serde_json::from_str(&content)?),
            ext => Err(ConfigError::UnsupportedFormat(ext.to_string())),
        }
    }

    /// Loads settings from environment variables only.
    ///
    /// Variables are prefixed with `MEETBOT_`, for example
    /// `MEETBOT_GUEST_NAME`, `MEETBOT_HEADLESS`, `MEETBOT_RECORDING_DIR`.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        settings.apply_env_overrides();
        settings
    }

    /// Applies environment variable overrides on top of current values.
    pub fn merge_with_env(mut self) -> Self {
        self.apply_env_overrides();
        self
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("MEETBOT_EMAIL") {
            self.email = Some(val);
        }
        if let Ok(val) = env::var("MEETBOT_PASSWORD") {
            self.password = Some(val);
        }
        if let Ok(val) = env::var("MEETBOT_GUEST_NAME") {
            self.guest_name = Some(val);
        }
        if let Ok(val) = env::var("MEETBOT_RECORDING_DIR") {
            self.recording_dir = Some(PathBuf::from(val));
        }
        if let Ok(val) = env::var("MEETBOT_CAMERA_ENABLED") {
            self.camera_enabled = Some(parse_bool(&val));
        }
        if let Ok(val) = env::var("MEETBOT_MIC_ENABLED") {
            self.mic_enabled = Some(parse_bool(&val));
        }
        if let Ok(val) = env::var("MEETBOT_HEADLESS") {
            self.headless = Some(parse_bool(&val));
        }
        if let Ok(val) = env::var("MEETBOT_EXECUTABLE_PATH") {
            self.executable_path = Some(PathBuf::from(val));
        }
        if let Ok(val) = env::var("MEETBOT_USER_DATA_DIR") {
            self.user_data_dir = Some(PathBuf::from(val));
        }
        if let Ok(val) = env::var("MEETBOT_REALISTIC_MOVEMENTS") {
            self.use_realistic_movements = Some(parse_bool(&val));
        }
        if let Ok(val) = env::var("MEETBOT_JOIN_TIMEOUT_MS") {
            if let Ok(ms) = val.parse() {
                self.join_timeout_ms = Some(ms);
            }
        }
        if let Ok(val) = env::var("MEETBOT_ADMISSION_TIMEOUT_MS") {
            if let Ok(ms) = val.parse() {
                self.admission_timeout_ms = Some(ms);
            }
        }
    }

    /// Validates loaded values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref name) = self.guest_name {
            if name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "guest_name must not be blank".to_string(),
                ));
            }
        }
        if self.email.is_some() != self.password.is_some() {
            return Err(ConfigError::ValidationError(
                "email and password must be provided together".to_string(),
            ));
        }
        Ok(())
    }

    /// Converts loaded settings into session options, filling every missing
    /// field from the [`SessionOptions`] defaults.
    pub fn into_options(self) -> SessionOptions {
        let mut opts = SessionOptions::default();

        if let (Some(email), Some(password)) = (self.email, self.password) {
            opts = opts.credentials(email, password);
        }
        if let Some(name) = self.guest_name {
            opts.guest_name = name;
        }
        if let Some(dir) = self.recording_dir {
            opts.recording_dir = dir;
        }
        if let Some(v) = self.camera_enabled {
            opts.camera_enabled = v;
        }
        if let Some(v) = self.mic_enabled {
            opts.mic_enabled = v;
        }
        if let Some(v) = self.headless {
            opts.headless = v;
        }
        if let Some(path) = self.executable_path {
            opts.executable_path = Some(path);
        }
        if let Some(path) = self.user_data_dir {
            opts.user_data_dir = Some(path);
        }
        opts.additional_args.extend(self.additional_args);
        if let Some(v) = self.use_realistic_movements {
            opts.use_realistic_movements = v;
        }
        if let Some(v) = self.randomize_viewport {
            opts.randomize_viewport = v;
        }
        if let Some(ms) = self.join_timeout_ms {
            opts.join_timeout_ms = ms;
        }
        if let Some(ms) = self.admission_timeout_ms {
            opts.admission_timeout_ms = ms;
        }

        opts
    }
}

fn parse_bool(val: &str) -> bool {
    matches!(val.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_variants() {
        assert!(parse_bool("true"));
        assert!(parse_bool("1"));
        assert!(parse_bool("YES"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("nonsense"));
    }

    #[test]
    fn test_toml_roundtrip() {
        let toml_src = r#"
            guest_name = "Note Taker"
            headless = false
            camera_enabled = true
            additional_args = ["--mute-audio"]
        "#;

        let settings: Settings = toml::from_str(toml_src).unwrap();
        assert_eq!(settings.guest_name.as_deref(), Some("Note Taker"));
        assert_eq!(settings.headless, Some(false));

        let opts = settings.into_options();
        assert_eq!(opts.guest_name, "Note Taker");
        assert!(!opts.headless);
        assert!(opts.camera_enabled);
        assert!(opts.additional_args.contains(&"--mute-audio".to_string()));
        // untouched fields keep their defaults
        assert_eq!(opts.join_timeout_ms, 60_000);
    }

    #[test]
    fn test_validation_rejects_lone_email() {
        let settings = Settings {
            email: Some("bot@example.com".to_string()),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_blank_guest_name() {
        let settings = Settings {
            guest_name: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_unsupported_format() {
        let dir = std::env::temp_dir();
        let path = dir.join("meetbot-settings-test.yaml");
        fs::write(&path, "guest_name: nope").unwrap();
        let result = Settings::from_file(&path);
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
        let _ = fs::remove_file(&path);
    }
}
