//! Human interaction simulation.
//!
//! Builds realistic pointer paths, keystroke pacing, and typo behavior so
//! page interactions are statistically indistinguishable from a person at
//! the keyboard. All randomness flows through a caller-seedable source.

pub mod bezier;
pub mod humanize;
pub mod timing;

pub use bezier::{generate_human_path, BezierCurve, Point};
pub use humanize::HumanInput;
pub use timing::DelayRange;
