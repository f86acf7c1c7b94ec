//! Configuration for the Chronicle compaction engine.
//!
//! Maps directly to `chronicle.toml`. Every field carries a serde default so
//! a partial (or empty) file yields the documented defaults:
//!
//! ```toml
//! [retention]
//! max_memories = 50
//!
//! [estimate]
//! summarize_threshold_bytes = 100000
//!
//! [tiering]
//! compress_threshold_bytes = 50000
//!
//! [context]
//! token_budget = 1000
//!
//! [store]
//! max_saves_per_player = 10
//! backend = "sqlite"
//! path = "data/saves.db"
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChronicleConfig {
    /// Logging settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Memory retention cap.
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Digest shape and bound.
    #[serde(default)]
    pub digest: DigestConfig,
    /// Size estimation thresholds.
    #[serde(default)]
    pub estimate: EstimateConfig,
    /// Summarized-tier shape and compression threshold.
    #[serde(default)]
    pub tiering: TieringConfig,
    /// Context window assembly.
    #[serde(default)]
    pub context: ContextConfig,
    /// Save store.
    #[serde(default)]
    pub store: StoreConfig,
}

impl ChronicleConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ChronicleError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::ChronicleError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level used when `RUST_LOG` is unset: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit newline-delimited JSON log lines.
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

/// Memory retention policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Maximum memories kept in a retained view (M).
    #[serde(default = "default_50")]
    pub max_memories: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { max_memories: 50 }
    }
}

/// Narrative digest shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    /// Hard bound on digest length, in characters.
    #[serde(default = "default_500")]
    pub max_digest_length: usize,
    /// Completed events listed in the `Recent` section.
    #[serde(default = "default_5")]
    pub recent_events: usize,
    /// Promise memories listed in the `Promises` section.
    #[serde(default = "default_3")]
    pub max_promises: usize,
    /// Each promise is cut to this many characters.
    #[serde(default = "default_100")]
    pub promise_chars: usize,
    /// Relationship descriptions listed in the `Relationships` section.
    #[serde(default = "default_3")]
    pub max_relationships: usize,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            max_digest_length: 500,
            recent_events: 5,
            max_promises: 3,
            promise_chars: 100,
            max_relationships: 3,
        }
    }
}

/// Size estimation thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateConfig {
    /// Sessions larger than this are saved in the summarized tier.
    #[serde(default = "default_100_000")]
    pub summarize_threshold_bytes: usize,
    /// Advisory: memories component larger than this.
    #[serde(default = "default_50_000")]
    pub memory_bytes_advisory: usize,
    /// Advisory: more memories than this.
    #[serde(default = "default_100")]
    pub memory_count_advisory: usize,
}

impl Default for EstimateConfig {
    fn default() -> Self {
        Self {
            summarize_threshold_bytes: 100_000,
            memory_bytes_advisory: 50_000,
            memory_count_advisory: 100,
        }
    }
}

/// Save tiering and encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TieringConfig {
    /// Payloads larger than this are gzip-compressed.
    #[serde(default = "default_50_000")]
    pub compress_threshold_bytes: usize,
    /// Story content kept in a summarized save, in characters.
    #[serde(default = "default_200")]
    pub story_preview_chars: usize,
    /// Completed events kept in a summarized save.
    #[serde(default = "default_5")]
    pub recent_events: usize,
    /// Inventory items kept in a summarized save.
    #[serde(default = "default_20")]
    pub max_inventory: usize,
    /// Available choices kept in a summarized save.
    #[serde(default = "default_10")]
    pub max_choices: usize,
}

impl Default for TieringConfig {
    fn default() -> Self {
        Self {
            compress_threshold_bytes: 50_000,
            story_preview_chars: 200,
            recent_events: 5,
            max_inventory: 20,
            max_choices: 10,
        }
    }
}

/// Context window assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Default token budget per generation request.
    #[serde(default = "default_1000")]
    pub token_budget: usize,
    /// Characters counted as one token.
    #[serde(default = "default_4")]
    pub chars_per_token: usize,
    /// Story content preview length, in characters.
    #[serde(default = "default_150")]
    pub story_preview_chars: usize,
    /// Promise memories included.
    #[serde(default = "default_3")]
    pub max_promises: usize,
    /// Relationship memories included.
    #[serde(default = "default_3")]
    pub max_relationships: usize,
    /// Most recent completed events included.
    #[serde(default = "default_3")]
    pub recent_events: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            token_budget: 1000,
            chars_per_token: 4,
            story_preview_chars: 150,
            max_promises: 3,
            max_relationships: 3,
            recent_events: 3,
        }
    }
}

/// Which durable medium backs the save store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process map; nothing survives a restart.
    Memory,
    /// `SQLite` file at [`StoreConfig::path`].
    Sqlite,
}

/// Save store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum saves per player (S).
    #[serde(default = "default_10")]
    pub max_saves_per_player: usize,
    /// Durable medium.
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    /// Database file for the `SQLite` backend.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_saves_per_player: 10,
            backend: StoreBackend::Sqlite,
            path: default_store_path(),
            wal_mode: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_backend() -> StoreBackend { StoreBackend::Sqlite }
fn default_store_path() -> PathBuf { PathBuf::from("data/saves.db") }
fn default_3() -> usize { 3 }
fn default_4() -> usize { 4 }
fn default_5() -> usize { 5 }
fn default_10() -> usize { 10 }
fn default_20() -> usize { 20 }
fn default_50() -> usize { 50 }
fn default_100() -> usize { 100 }
fn default_150() -> usize { 150 }
fn default_200() -> usize { 200 }
fn default_500() -> usize { 500 }
fn default_1000() -> usize { 1000 }
fn default_50_000() -> usize { 50_000 }
fn default_100_000() -> usize { 100_000 }

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
