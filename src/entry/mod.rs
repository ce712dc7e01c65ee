//! Meeting-entry strategies, DOM probes, and the entry state machine.

pub mod machine;
pub mod probes;

pub use machine::{EntryMachine, EntryOutcome, EntryState, StrategyAttempt, StrategyKind};
pub use probes::{AriaProbe, DomProbe, ProbeCatalog, ProbeSet, SelectorProbe, TextProbe};
