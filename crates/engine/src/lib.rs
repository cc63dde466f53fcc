//! # Helmsman Engine
//!
//! The bot supervisor and the generic strategy-engine frame.
//!
//! A [`Supervisor`] owns one engine per strategy. Each engine runs a
//! long-lived scheduler ([`frame::run_engine`]): every tick it queries the
//! fresh set of admissible bots and spawns one work unit per bot. Work units
//! are serialized per bot by a try-only in-flight lock, re-derive admission
//! from storage, honor cooldowns, and classify their result into a single
//! [`core_types::Outcome`] which yields exactly one activity log entry.
//!
//! Failures stay inside the work unit that caused them: a venue rejection is
//! a failed trade record, not a crashed engine.

pub mod context;
pub mod error;
pub mod frame;
pub mod locks;
pub mod ring;
pub mod supervisor;
pub mod warnings;
pub mod workers;

pub use context::EngineContext;
pub use error::EngineError;
pub use frame::StrategyWorker;
pub use locks::InFlightLocks;
pub use ring::{LogRing, LogRings};
pub use supervisor::{AdjustReport, MarketStatus, StrategyStatus, Supervisor, SupervisorStatus};
pub use warnings::Warnings;
