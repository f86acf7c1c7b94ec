//! # Chronicle Core Library
//!
//! Bounded narrative state compaction for long-running interactive story
//! sessions. A session's memory log grows without limit; everything that
//! leaves the live session is bounded:
//!
//! - **Retention**: deterministic ranking keeps the best `M` memories
//! - **Digest**: one bounded line summarising where the story stands
//! - **Tiering**: full or summarized saves, gzip above a size threshold
//! - **Context**: a token-budgeted view for the generation backend
//! - **Store**: at most `S` saves per player, single writer per player
//!
//! ## Guarantees
//!
//! - Identical sessions produce identical retained views, digests and
//!   summarized payloads.
//! - Full saves round-trip exactly; summarized saves keep every promise
//!   while promises fit the retention cap.
//! - A failed save leaves the player's saves unchanged.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod context;
pub mod digest;
pub mod engine;
pub mod error;
pub mod estimate;
pub mod kv;
pub mod metrics;
pub mod retention;
pub mod session;
pub mod sessions;
pub mod store;
pub mod telemetry;
pub mod text;
pub mod tiering;
pub mod types;

pub use config::ChronicleConfig;
pub use context::ContextView;
pub use engine::Chronicle;
pub use error::{ChronicleError, Result};
pub use estimate::SizeEstimate;
pub use kv::{KvBackend, MemoryKv, SqliteKv};
pub use session::{GenerationOutcome, MemoryArena, SessionState};
pub use sessions::SessionTable;
pub use store::{SaveStats, SaveStore};
pub use tiering::{SaveMeta, SavePayload, SaveRecord, Tier};
pub use types::*;
