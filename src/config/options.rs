//! Per-session configuration.
//!
//! [`SessionOptions`] is supplied by the caller when a manager is constructed
//! and stays immutable for the lifetime of one meeting session. Defaults are
//! filled in at construction; the builder methods override individual fields.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Provider account credentials for the login entry strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Account email address.
    pub email: String,
    /// Account password.
    pub password: String,
}

/// Caller-supplied configuration for one meeting session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Optional provider credentials. When absent, login strategies fall
    /// back to guest entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,

    /// Display name used for guest entry.
    pub guest_name: String,

    /// Directory for recordings and failure screenshots. Created on demand.
    pub recording_dir: PathBuf,

    /// Desired camera state inside the meeting.
    pub camera_enabled: bool,

    /// Desired microphone state inside the meeting.
    pub mic_enabled: bool,

    /// Run the browser without a visible window.
    pub headless: bool,

    /// Path to a browser executable. If None, uses the system default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable_path: Option<PathBuf>,

    /// Browser profile directory. If None, a throwaway profile is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data_dir: Option<PathBuf>,

    /// Extra browser launch arguments appended after the baseline set.
    #[serde(default)]
    pub additional_args: Vec<String>,

    /// Min/max delay in milliseconds inserted between automation actions.
    pub action_delay_ms: (u64, u64),

    /// Drive the pointer along bezier paths and type with human cadence.
    /// When false, interactions degrade to instantaneous deterministic
    /// operations.
    pub use_realistic_movements: bool,

    /// Draw the viewport from the identity pool instead of the default.
    pub randomize_viewport: bool,

    /// Bounded wait for the join/admit control to appear.
    pub join_timeout_ms: u64,

    /// Bounded wait for post-join UI markers after clicking join.
    pub admission_timeout_ms: u64,

    /// Fixed seed for identity generation, input randomization and strategy
    /// shuffling. None uses an entropy source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            credentials: None,
            guest_name: "Guest".to_string(),
            recording_dir: PathBuf::from("./recordings"),
            camera_enabled: false,
            mic_enabled: false,
            headless: true,
            executable_path: None,
            user_data_dir: None,
            additional_args: Vec::new(),
            action_delay_ms: (400, 1200),
            use_realistic_movements: true,
            randomize_viewport: true,
            join_timeout_ms: 60_000,
            admission_timeout_ms: 30_000,
            rng_seed: None,
        }
    }
}

impl SessionOptions {
    /// Creates options with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets provider credentials.
    pub fn credentials(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            email: email.into(),
            password: password.into(),
        });
        self
    }

    /// Sets the guest display name.
    pub fn guest_name(mut self, name: impl Into<String>) -> Self {
        self.guest_name = name.into();
        self
    }

    /// Sets the recording/screenshot output directory.
    pub fn recording_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.recording_dir = dir.into();
        self
    }

    /// Sets the desired camera state.
    pub fn camera_enabled(mut self, enabled: bool) -> Self {
        self.camera_enabled = enabled;
        self
    }

    /// Sets the desired microphone state.
    pub fn mic_enabled(mut self, enabled: bool) -> Self {
        self.mic_enabled = enabled;
        self
    }

    /// Sets headless mode.
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Sets the browser executable path.
    pub fn executable_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable_path = Some(path.into());
        self
    }

    /// Sets the browser profile directory.
    pub fn user_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.user_data_dir = Some(path.into());
        self
    }

    /// Appends a browser launch argument.
    pub fn add_arg(mut self, arg: impl Into<String>) -> Self {
        self.additional_args.push(arg.into());
        self
    }

    /// Sets the inter-action delay range in milliseconds.
    pub fn action_delay_ms(mut self, min: u64, max: u64) -> Self {
        self.action_delay_ms = (min, max.max(min));
        self
    }

    /// Enables or disables realistic pointer/keyboard simulation.
    pub fn realistic_movements(mut self, enabled: bool) -> Self {
        self.use_realistic_movements = enabled;
        self
    }

    /// Enables or disables viewport randomization.
    pub fn randomize_viewport(mut self, enabled: bool) -> Self {
        self.randomize_viewport = enabled;
        self
    }

    /// Sets the join-control wait budget in milliseconds.
    pub fn join_timeout_ms(mut self, ms: u64) -> Self {
        self.join_timeout_ms = ms;
        self
    }

    /// Sets the admission-confirmation wait budget in milliseconds.
    pub fn admission_timeout_ms(mut self, ms: u64) -> Self {
        self.admission_timeout_ms = ms;
        self
    }

    /// Fixes the random seed for deterministic runs.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// True when credentials are present and non-empty.
    pub fn has_credentials(&self) -> bool {
        self.credentials
            .as_ref()
            .map(|c| !c.email.is_empty() && !c.password.is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = SessionOptions::default();
        assert!(opts.headless);
        assert!(opts.use_realistic_movements);
        assert!(!opts.camera_enabled);
        assert!(!opts.mic_enabled);
        assert_eq!(opts.guest_name, "Guest");
        assert_eq!(opts.join_timeout_ms, 60_000);
        assert!(opts.credentials.is_none());
    }

    #[test]
    fn test_builder_chain() {
        let opts = SessionOptions::new()
            .guest_name("Note Taker")
            .credentials("bot@example.com", "hunter2")
            .recording_dir("/tmp/caps")
            .camera_enabled(true)
            .action_delay_ms(100, 50)
            .rng_seed(7);

        assert_eq!(opts.guest_name, "Note Taker");
        assert!(opts.has_credentials());
        assert_eq!(opts.recording_dir, PathBuf::from("/tmp/caps"));
        assert!(opts.camera_enabled);
        // max is clamped up to min
        assert_eq!(opts.action_delay_ms, (100, 100));
        assert_eq!(opts.rng_seed, Some(7));
    }

    #[test]
    fn test_empty_credentials_do_not_count() {
        let opts = SessionOptions::new().credentials("", "");
        assert!(!opts.has_credentials());
    }
}
