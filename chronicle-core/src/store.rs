//! Save store with per-player cap and single-writer discipline.
//!
//! ```text
//!   create(record)
//!     │  lock writer[player]
//!     ├─ evict oldest until cap - 1 remain  (restore on failure)
//!     ├─ put saves/{player}/{save}          (restore evicted on failure)
//!     └─ check count ≤ cap                  (undo + CapacityViolation otherwise)
//! ```
//!
//! Each record is one KV value: a 4-byte big-endian metadata length, the
//! metadata as JSON, then the payload bytes. Listing only parses metadata.
//! Reads never take the writer lock; since the key set never exceeds the cap
//! at any instant, neither does a listing.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{ChronicleError, Resource, Result};
use crate::kv::KvBackend;
use crate::tiering::{SaveMeta, SaveRecord, Tier};
use crate::types::{PlayerId, SaveId};

const ROOT_PREFIX: &str = "saves/";
const LEN_PREFIX: usize = 4;

fn player_prefix(player: PlayerId) -> String {
    format!("{ROOT_PREFIX}{player}/")
}

fn record_key(player: PlayerId, save: SaveId) -> String {
    format!("{ROOT_PREFIX}{player}/{save}")
}

// ---------------------------------------------------------------------------
// Entry codec
// ---------------------------------------------------------------------------

fn encode_entry(record: &SaveRecord) -> Result<Vec<u8>> {
    let meta = serde_json::to_vec(&record.meta).map_err(|e| ChronicleError::Encoding(e.to_string()))?;
    let meta_len = u32::try_from(meta.len())
        .map_err(|_| ChronicleError::Encoding(format!("metadata too large: {} bytes", meta.len())))?;

    let mut entry = Vec::with_capacity(LEN_PREFIX + meta.len() + record.payload.len());
    entry.extend_from_slice(&meta_len.to_be_bytes());
    entry.extend_from_slice(&meta);
    entry.extend_from_slice(&record.payload);
    Ok(entry)
}

fn split_entry(entry: &[u8]) -> Result<(SaveMeta, &[u8])> {
    let Some((len_bytes, rest)) = entry.split_first_chunk::<LEN_PREFIX>() else {
        return Err(ChronicleError::Encoding("entry shorter than its header".into()));
    };
    let meta_len = u32::from_be_bytes(*len_bytes) as usize;
    if rest.len() < meta_len {
        return Err(ChronicleError::Encoding(format!(
            "entry metadata truncated: want {meta_len} bytes, have {}",
            rest.len()
        )));
    }
    let (meta_bytes, payload) = rest.split_at(meta_len);
    let meta: SaveMeta =
        serde_json::from_slice(meta_bytes).map_err(|e| ChronicleError::Encoding(format!("save metadata: {e}")))?;
    Ok((meta, payload))
}

fn decode_entry(entry: &[u8]) -> Result<SaveRecord> {
    let (meta, payload) = split_entry(entry)?;
    Ok(SaveRecord {
        meta,
        payload: payload.to_vec(),
    })
}

/// Oldest first: `created_at` asc, then `save_id` asc.
fn oldest_first(a: &SaveMeta, b: &SaveMeta) -> std::cmp::Ordering {
    a.created_at.cmp(&b.created_at).then_with(|| a.save_id.cmp(&b.save_id))
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Aggregate numbers over a set of saves.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SaveStats {
    /// Number of saves.
    pub total_saves: usize,
    /// Saves in the full tier.
    pub full_saves: usize,
    /// Saves in the summarized tier.
    pub summarized_saves: usize,
    /// Saves whose payload is compressed.
    pub compressed_saves: usize,
    /// Sum of pre-compression payload sizes.
    pub total_size_bytes: usize,
    /// Sum of stored payload sizes.
    pub total_stored_bytes: usize,
}

impl SaveStats {
    fn add(&mut self, meta: &SaveMeta) {
        self.total_saves += 1;
        match meta.tier {
            Tier::Full => self.full_saves += 1,
            Tier::Summarized => self.summarized_saves += 1,
        }
        if meta.compressed {
            self.compressed_saves += 1;
        }
        self.total_size_bytes += meta.size_bytes;
        self.total_stored_bytes += meta.stored_bytes;
    }

    /// Mean pre-compression size, 0 when there are no saves.
    #[must_use]
    pub fn average_size_bytes(&self) -> usize {
        self.total_size_bytes.checked_div(self.total_saves).unwrap_or(0)
    }

    /// Stored bytes per logical byte (1.0 when nothing is stored).
    #[must_use]
    pub fn storage_ratio(&self) -> f64 {
        if self.total_size_bytes == 0 {
            1.0
        } else {
            self.total_stored_bytes as f64 / self.total_size_bytes as f64
        }
    }
}

// ---------------------------------------------------------------------------
// SaveStore
// ---------------------------------------------------------------------------

/// A save removed to make room, kept until the insert is known to have stuck.
struct EvictedEntry {
    save_id: SaveId,
    key: String,
    entry: Vec<u8>,
}

/// Outcome of a successful [`SaveStore::create`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateOutcome {
    /// Saves removed to respect the cap, oldest first.
    pub evicted: Vec<SaveId>,
}

/// Persists [`SaveRecord`]s on a [`KvBackend`], enforcing the per-player cap.
pub struct SaveStore<B: KvBackend> {
    backend: B,
    max_saves_per_player: usize,
    writers: DashMap<PlayerId, Arc<Mutex<()>>>,
}

impl<B: KvBackend> std::fmt::Debug for SaveStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveStore")
            .field("max_saves_per_player", &self.max_saves_per_player)
            .field("writers", &self.writers.len())
            .finish_non_exhaustive()
    }
}

impl<B: KvBackend> SaveStore<B> {
    /// Wrap a backend. A cap of 0 is treated as 1.
    pub fn new(backend: B, max_saves_per_player: usize) -> Self {
        Self {
            backend,
            max_saves_per_player: max_saves_per_player.max(1),
            writers: DashMap::new(),
        }
    }

    /// Per-player save cap.
    #[must_use]
    pub fn max_saves_per_player(&self) -> usize {
        self.max_saves_per_player
    }

    /// The underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn writer(&self, player: PlayerId) -> Arc<Mutex<()>> {
        self.writers.entry(player).or_default().clone()
    }

    /// Persist `record`, evicting the player's oldest saves beyond the cap.
    ///
    /// # Errors
    ///
    /// - [`ChronicleError::StoreUnavailable`] if the backend fails.
    /// - [`ChronicleError::CapacityViolation`] if the cap does not hold after
    ///   the write.
    ///
    /// In both cases the player's save set is left as it was.
    pub fn create(&self, record: &SaveRecord) -> Result<CreateOutcome> {
        let meta = &record.meta;
        let entry = encode_entry(record)?;
        let key = record_key(meta.player_id, meta.save_id);

        let lock = self.writer(meta.player_id);
        let _guard = lock.lock();

        let evicted = self.make_room(meta.player_id, meta.save_id)?;

        if let Err(e) = self.backend.put(&key, &entry) {
            warn!(player = %meta.player_id, save = %meta.save_id, error = %e, "Insert failed, restoring evicted saves");
            self.restore(&evicted);
            return Err(e);
        }

        let violation = match self.backend.list_keys(&player_prefix(meta.player_id)) {
            Ok(keys) if keys.len() <= self.max_saves_per_player => None,
            Ok(keys) => Some(ChronicleError::CapacityViolation {
                player: meta.player_id.to_string(),
                limit: self.max_saves_per_player,
                found: keys.len(),
            }),
            Err(e) => Some(e),
        };
        if let Some(e) = violation {
            error!(player = %meta.player_id, save = %meta.save_id, error = %e, "Post-write check failed, undoing save");
            if let Err(undo) = self.backend.delete(&key) {
                error!(player = %meta.player_id, save = %meta.save_id, error = %undo, "Undo failed");
            }
            self.restore(&evicted);
            return Err(e);
        }

        info!(
            player = %meta.player_id,
            save = %meta.save_id,
            tier = %meta.tier,
            evicted = evicted.len(),
            "Save stored"
        );
        Ok(CreateOutcome {
            evicted: evicted.into_iter().map(|e| e.save_id).collect(),
        })
    }

    /// Delete the oldest saves other than `incoming` until `cap - 1` remain.
    /// On failure, anything already evicted is put back.
    fn make_room(&self, player: PlayerId, incoming: SaveId) -> Result<Vec<EvictedEntry>> {
        let mut others: Vec<(SaveMeta, String, Vec<u8>)> = Vec::new();
        for key in self.backend.list_keys(&player_prefix(player))? {
            let Some(entry) = self.backend.get(&key)? else {
                continue;
            };
            let (meta, _) = split_entry(&entry)?;
            if meta.save_id != incoming {
                others.push((meta, key, entry));
            }
        }
        others.sort_by(|a, b| oldest_first(&a.0, &b.0));

        let excess = (others.len() + 1).saturating_sub(self.max_saves_per_player);
        let mut evicted: Vec<EvictedEntry> = Vec::with_capacity(excess);
        for (meta, key, entry) in others.into_iter().take(excess) {
            if let Err(e) = self.backend.delete(&key) {
                self.restore(&evicted);
                return Err(e);
            }
            info!(player = %player, save = %meta.save_id, created_at = %meta.created_at, "Evicted save");
            evicted.push(EvictedEntry {
                save_id: meta.save_id,
                key,
                entry,
            });
        }
        Ok(evicted)
    }

    fn restore(&self, evicted: &[EvictedEntry]) {
        for e in evicted {
            if let Err(restore) = self.backend.put(&e.key, &e.entry) {
                error!(key = %e.key, error = %restore, "Failed to restore evicted save");
            }
        }
    }

    /// Fetch a save.
    ///
    /// # Errors
    ///
    /// [`ChronicleError::NotFound`] if absent, [`ChronicleError::Encoding`]
    /// if the stored entry is malformed.
    pub fn get(&self, player: PlayerId, save: SaveId) -> Result<SaveRecord> {
        let entry = self
            .backend
            .get(&record_key(player, save))?
            .ok_or_else(|| ChronicleError::not_found(Resource::Save, save))?;
        decode_entry(&entry)
    }

    fn metas_under(&self, prefix: &str) -> Result<Vec<SaveMeta>> {
        let mut metas = Vec::new();
        for key in self.backend.list_keys(prefix)? {
            // A key may vanish between listing and reading under a concurrent
            // create or delete; the result is then a subset of the listed set.
            if let Some(entry) = self.backend.get(&key)? {
                metas.push(split_entry(&entry)?.0);
            }
        }
        Ok(metas)
    }

    /// A player's saves, newest first (`created_at` desc, then `save_id` desc).
    ///
    /// # Errors
    ///
    /// Backend or entry decoding failures.
    pub fn list(&self, player: PlayerId) -> Result<Vec<SaveMeta>> {
        let mut metas = self.metas_under(&player_prefix(player))?;
        metas.sort_by(|a, b| oldest_first(b, a));
        Ok(metas)
    }

    /// Delete a save by id. Returns `false` if no such save exists.
    ///
    /// # Errors
    ///
    /// Backend failures.
    pub fn delete(&self, save: SaveId) -> Result<bool> {
        let suffix = format!("/{save}");
        let Some(key) = self
            .backend
            .list_keys(ROOT_PREFIX)?
            .into_iter()
            .find(|k| k.ends_with(&suffix))
        else {
            return Ok(false);
        };
        let Some(entry) = self.backend.get(&key)? else {
            return Ok(false);
        };
        let (meta, _) = split_entry(&entry)?;

        let lock = self.writer(meta.player_id);
        let _guard = lock.lock();
        // The lookup above ran unlocked; a writer may have evicted the save since.
        if self.backend.get(&key)?.is_none() {
            return Ok(false);
        }
        let deleted = self.backend.delete(&key)?;
        if deleted {
            info!(player = %meta.player_id, save = %save, "Save deleted");
        }
        Ok(deleted)
    }

    /// Aggregate statistics for one player, or for every player.
    ///
    /// # Errors
    ///
    /// Backend or entry decoding failures.
    pub fn stats(&self, player: Option<PlayerId>) -> Result<SaveStats> {
        let prefix = player.map_or_else(|| ROOT_PREFIX.to_owned(), player_prefix);
        let mut stats = SaveStats::default();
        for meta in self.metas_under(&prefix)? {
            stats.add(&meta);
        }
        Ok(stats)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
