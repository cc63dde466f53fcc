//! # Helmsman Database Crate
//!
//! High-level, application-specific interface to the PostgreSQL store: users
//! and their credentials, per-strategy bot documents, append-only trade
//! records and activity logs.
//!
//! ## Architectural Principles
//!
//! - **Adapter layer:** encapsulates all SQL and schema details behind a
//!   small API the engines consume.
//! - **Field-scoped writes:** intent fields belong to the frontend, runtime
//!   fields to the engines; no query ever overwrites fields outside its side
//!   of that split.
//! - **Append-only audit:** trade records and activity logs are inserted and
//!   never mutated.

pub mod connection;
pub mod credentials;
pub mod error;
pub mod repository;

pub use connection::{connect, run_migrations};
pub use credentials::CredentialStore;
pub use error::DbError;
pub use repository::BotRepository;
