//! # Meetbot
//!
//! A stealth meeting-automation engine: drives a Chromium browser into a
//! live video-conferencing session, evades basic bot-detection heuristics,
//! negotiates the variable pre-join UI flow, and records the meeting to
//! durable storage.
//!
//! ## Features
//!
//! - **Fingerprint Provisioning**: self-consistent synthetic browser
//!   identities drawn from curated pools
//! - **Stealth Browser Session**: Chromium launched with automation markers
//!   stripped and navigator/canvas/permission overrides installed before any
//!   page script runs
//! - **Human-like Input Simulation**: Bezier-curve pointer paths, realistic
//!   typing cadence with typo correction
//! - **Multi-strategy Meeting Entry**: shuffled entry strategies with
//!   error-screen detection, guest and credentialed sign-in flows, and a
//!   permissive last-resort attempt on a relaunched minimal identity
//! - **Recording**: ffmpeg screen-and-audio capture with single-active
//!   enforcement
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meetbot::config::SessionOptions;
//! use meetbot::session::MeetingSessionManager;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let options = SessionOptions::new()
//!         .guest_name("Note Taker")
//!         .recording_dir("./recordings");
//!
//!     let manager = MeetingSessionManager::new(options);
//!     manager.join("https://meet.example.com/abc-defg-hij").await?;
//!     let path = manager.start_recording(Some(60)).await?;
//!     println!("recording to {}", path.display());
//!
//!     manager.stop_recording().await?;
//!     manager.leave().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`stealth`]: identity generation and page-level stealth patches
//! - [`browser`]: Chromium launch and the page abstraction
//! - [`input`]: human-like pointer and keyboard simulation
//! - [`entry`]: DOM probes and the meeting-entry state machine
//! - [`recording`]: capture backends and the recording controller
//! - [`session`]: the externally-visible session manager facade
//! - [`config`]: options, file/env configuration loading
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │               MeetingSessionManager                  │
//! ├──────────────────────────────────────────────────────┤
//! │  ┌─────────┐   ┌───────────┐   ┌──────────────────┐  │
//! │  │  Entry  │──▶│  Human    │──▶│ Stealth Browser  │  │
//! │  │ Machine │   │  Input    │   │     Session      │  │
//! │  └─────────┘   └───────────┘   └────────┬─────────┘  │
//! │  ┌───────────┐                 ┌────────┴─────────┐  │
//! │  │ Recording │                 │    Fingerprint   │  │
//! │  │Controller │                 │    Provisioner   │  │
//! │  └───────────┘                 └──────────────────┘  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//!
//! Configuration follows a precedence chain:
//! 1. Default values
//! 2. Configuration file (TOML/JSON)
//! 3. Environment variables (`MEETBOT_*`)
//! 4. CLI arguments

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

// ============================================================================
// Module Exports
// ============================================================================

/// Browser launch, stealth patch installation, and the page abstraction.
pub mod browser;

/// Options and configuration loading from files and environment.
pub mod config;

/// DOM probes and the meeting-entry state machine.
pub mod entry;

/// Error taxonomy shared across the crate.
pub mod error;

/// Human-like pointer and keyboard simulation.
pub mod input;

/// Screen-and-audio capture of the live meeting.
pub mod recording;

/// The externally-visible meeting session manager facade.
pub mod session;

/// Synthetic browser identity generation and page-level stealth patches.
pub mod stealth;

// ============================================================================
// Re-exports for Convenience
// ============================================================================

pub use browser::{ElementRef, MeetingPage, ScriptedPage, StealthBrowserSession};
pub use config::{Credentials, SessionOptions, Settings};
pub use entry::{EntryMachine, EntryOutcome, EntryState, ProbeCatalog, StrategyKind};
pub use error::{MeetError, MeetResult};
pub use input::{HumanInput, Point};
pub use recording::{FfmpegCapture, NullCapture, RecordingController};
pub use session::{MeetingSessionManager, MeetingStatus, ScriptedDriver, SessionDriver};
pub use stealth::{BrowserIdentity, IdentityGenerator};

/// Commonly used types for embedding callers.
pub mod prelude {
    pub use crate::config::{Credentials, SessionOptions};
    pub use crate::error::{MeetError, MeetResult};
    pub use crate::session::{MeetingSessionManager, MeetingStatus};
}
