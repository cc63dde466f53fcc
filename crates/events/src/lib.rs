//! # Helmsman Events
//!
//! This crate defines the event structures that flow from the strategy
//! engines to the notification service over a broadcast channel.
//!
//! As a Layer 0 crate, it depends only on `core-types` and provides the
//! definitive language for everything the operator can be alerted about.

pub mod messages;

pub use messages::BotEvent;
