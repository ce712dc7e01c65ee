//! Configuration management.
//!
//! Two layers: [`SessionOptions`] is the immutable per-session value the rest
//! of the engine consumes, and [`Settings`] is its durable representation
//! loaded from TOML/JSON files and `MEETBOT_*` environment variables.

pub mod options;
pub mod settings;

pub use options::{Credentials, SessionOptions};
pub use settings::{ConfigError, Settings};
