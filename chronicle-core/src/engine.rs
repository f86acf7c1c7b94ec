//! The `Chronicle` facade.
//!
//! One value owns the configuration, the save store and the counters, and
//! exposes the whole external surface:
//!
//! ```text
//!   estimate_size ─┐
//!   save ──────────┼─► tiering::encode ─► SaveStore::create (cap, evict)
//!   load ──────────┴─► SaveStore::get ─► tiering::decode ─► SessionState
//!   list_saves / delete_save / save_stats ─► SaveStore
//!   build_context ─► context::assemble
//! ```
//!
//! Everything except the store calls is pure and synchronous.

use std::time::Instant;

use tracing::{debug, info, info_span, warn};

use crate::config::{ChronicleConfig, StoreBackend};
use crate::context::{self, ContextView};
use crate::error::{ChronicleError, Resource, Result};
use crate::estimate::{self, SizeEstimate};
use crate::kv::{KvBackend, MemoryKv, SqliteKv};
use crate::metrics::{spans, ChronicleCounters, CounterSnapshot};
use crate::session::SessionState;
use crate::store::{SaveStats, SaveStore};
use crate::tiering::{self, SaveMeta, SavePayload, Tier};
use crate::types::{PlayerId, SaveId};

/// Compaction engine over a [`KvBackend`].
pub struct Chronicle<B: KvBackend> {
    config: ChronicleConfig,
    store: SaveStore<B>,
    counters: ChronicleCounters,
}

impl<B: KvBackend> std::fmt::Debug for Chronicle<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chronicle")
            .field("store", &self.store)
            .field("counters", &self.counters.snapshot())
            .finish_non_exhaustive()
    }
}

impl Chronicle<MemoryKv> {
    /// Engine over a fresh in-process store.
    #[must_use]
    pub fn in_memory(config: ChronicleConfig) -> Self {
        Self::new(MemoryKv::new(), config)
    }
}

impl Chronicle<Box<dyn KvBackend>> {
    /// Engine over the backend named in `config.store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the `SQLite` database cannot be opened.
    pub fn open(config: ChronicleConfig) -> Result<Self> {
        let backend: Box<dyn KvBackend> = match config.store.backend {
            StoreBackend::Memory => Box::new(MemoryKv::new()),
            StoreBackend::Sqlite => Box::new(SqliteKv::open(&config.store.path, config.store.wal_mode)?),
        };
        Ok(Self::new(backend, config))
    }
}

impl<B: KvBackend> Chronicle<B> {
    /// Engine over an existing backend.
    pub fn new(backend: B, config: ChronicleConfig) -> Self {
        let store = SaveStore::new(backend, config.store.max_saves_per_player);
        Self {
            config,
            store,
            counters: ChronicleCounters::new(),
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ChronicleConfig {
        &self.config
    }

    /// The underlying save store.
    #[must_use]
    pub fn store(&self) -> &SaveStore<B> {
        &self.store
    }

    /// Measure a session. Pure.
    #[must_use]
    pub fn estimate_size(&self, session: &SessionState) -> SizeEstimate {
        estimate::estimate_size(session, &self.config.estimate, &self.config.retention)
    }

    /// Encode and persist a snapshot of `session`.
    ///
    /// The tier follows the size estimate; the player's oldest saves beyond
    /// the cap are evicted.
    ///
    /// # Errors
    ///
    /// Store failures; the player's save set is unchanged in that case.
    pub fn save(&self, session: &SessionState, save_name: &str) -> Result<SaveMeta> {
        let _span = info_span!(spans::SAVE, player = %session.player.id).entered();
        let start = Instant::now();

        let estimate = self.estimate_size(session);
        for suggestion in &estimate.suggestions {
            debug!(player = %session.player.id, suggestion = %suggestion, "Size advisory");
        }

        let record = tiering::encode(session, save_name, &estimate, &self.config)?;
        let outcome = match self.store.create(&record) {
            Ok(outcome) => outcome,
            Err(e) => {
                ChronicleCounters::incr(&self.counters.save_failures);
                warn!(player = %session.player.id, error = %e, "Save failed");
                return Err(e);
            }
        };

        let meta = record.meta;
        match meta.tier {
            Tier::Full => ChronicleCounters::incr(&self.counters.saves_full),
            Tier::Summarized => ChronicleCounters::incr(&self.counters.saves_summarized),
        }
        if meta.compressed {
            ChronicleCounters::incr(&self.counters.saves_compressed);
        }
        let discarded = meta.original_memory_count.saturating_sub(meta.kept_memory_count);
        ChronicleCounters::add(&self.counters.memories_discarded, discarded as u64);
        ChronicleCounters::add(&self.counters.saves_evicted, outcome.evicted.len() as u64);

        info!(
            player = %meta.player_id,
            save = %meta.save_id,
            name = %meta.save_name,
            tier = %meta.tier,
            compressed = meta.compressed,
            size_bytes = meta.size_bytes,
            memories_discarded = discarded,
            "Session saved"
        );
        debug!(elapsed_us = start.elapsed().as_micros(), "save timing");
        Ok(meta)
    }

    /// Load and decode a save without expanding it.
    ///
    /// # Errors
    ///
    /// [`ChronicleError::NotFound`] for an unknown save,
    /// [`ChronicleError::Encoding`] for an undecodable one.
    pub fn load_payload(&self, player: PlayerId, save: SaveId) -> Result<SavePayload> {
        let _span = info_span!(spans::LOAD, player = %player, save = %save).entered();
        let start = Instant::now();

        let record = self.store.get(player, save)?;
        if record.meta.player_id != player {
            return Err(ChronicleError::not_found(Resource::Save, save));
        }
        let payload = tiering::decode(&record).inspect_err(|e| {
            ChronicleCounters::incr(&self.counters.load_failures);
            warn!(player = %player, save = %save, error = %e, "Save could not be decoded");
        })?;

        ChronicleCounters::incr(&self.counters.loads);
        info!(player = %player, save = %save, tier = %record.meta.tier, "Save loaded");
        debug!(elapsed_us = start.elapsed().as_micros(), "load timing");
        Ok(payload)
    }

    /// Load a save as a live session. Summarized saves come back reduced.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load_payload`].
    pub fn load(&self, player: PlayerId, save: SaveId) -> Result<SessionState> {
        self.load_payload(player, save).map(SavePayload::into_session)
    }

    /// A player's saves, newest first.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn list_saves(&self, player: PlayerId) -> Result<Vec<SaveMeta>> {
        self.store.list(player)
    }

    /// Delete a save. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn delete_save(&self, save: SaveId) -> Result<bool> {
        let deleted = self.store.delete(save)?;
        if deleted {
            ChronicleCounters::incr(&self.counters.saves_deleted);
        }
        Ok(deleted)
    }

    /// Save statistics for one player or for all players.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn save_stats(&self, player: Option<PlayerId>) -> Result<SaveStats> {
        self.store.stats(player)
    }

    /// Build a context view bounded by `token_budget`. Never fails.
    #[must_use]
    pub fn build_context(&self, session: &SessionState, token_budget: usize) -> ContextView {
        let _span = info_span!(spans::CONTEXT, player = %session.player.id).entered();
        let view = context::assemble(session, token_budget, &self.config.context);
        ChronicleCounters::incr(&self.counters.context_builds);
        if view.over_budget {
            ChronicleCounters::incr(&self.counters.context_over_budget);
        }
        view
    }

    /// Build a context view with the configured default budget.
    #[must_use]
    pub fn default_context(&self, session: &SessionState) -> ContextView {
        self.build_context(session, self.config.context.token_budget)
    }

    /// Current counter values.
    #[must_use]
    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
