//! Save tiering and encoding.
//!
//! A save is produced in one of two tiers:
//!
//! - **Full**: the whole [`SessionState`], lossless.
//! - **Summarized**: a [`SummarizedState`]: player, a story preview, capped
//!   choices, the retained memories, the digest, and a progression with
//!   capped events and inventory.
//!
//! Independently of the tier, a payload above the compression threshold is
//! gzip-compressed. `tier` and `compressed` are explicit fields of
//! [`SaveMeta`]; decoding matches on them and nothing else. Every stored
//! payload carries a SHA-256 checksum that is verified before decoding.

use std::io::{Read, Write};

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::ChronicleConfig;
use crate::digest;
use crate::error::{ChronicleError, Result};
use crate::estimate::SizeEstimate;
use crate::retention;
use crate::session::{MemoryArena, SessionState};
use crate::text::truncate_with_marker;
use crate::types::{ChoiceOption, MemoryRecord, Player, PlayerId, Progression, SaveId, StorySegment};

// ---------------------------------------------------------------------------
// Record types
// ---------------------------------------------------------------------------

/// Representation of a persisted snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Entire session, lossless.
    Full,
    /// Reduced session.
    Summarized,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Summarized => write!(f, "summarized"),
        }
    }
}

/// Everything about a save except its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveMeta {
    /// Unique identifier.
    pub save_id: SaveId,
    /// Owning player.
    pub player_id: PlayerId,
    /// Player's display name at save time.
    pub player_name: String,
    /// Caller-supplied label.
    pub save_name: String,
    /// When the save was taken.
    pub created_at: DateTime<Utc>,
    /// Full or summarized.
    pub tier: Tier,
    /// Whether the payload is gzip-compressed.
    pub compressed: bool,
    /// Serialized payload size before compression.
    pub size_bytes: usize,
    /// Payload size as stored.
    pub stored_bytes: usize,
    /// SHA-256 of the stored payload, lowercase hex.
    pub checksum: String,
    /// Memories in the live session at save time.
    pub original_memory_count: usize,
    /// Memories carried by the payload.
    pub kept_memory_count: usize,
}

impl SaveMeta {
    /// How many live memories each saved memory stands for (≥ 1.0).
    #[must_use]
    pub fn memory_compaction_ratio(&self) -> f64 {
        self.original_memory_count as f64 / self.kept_memory_count.max(1) as f64
    }
}

/// A persisted snapshot. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRecord {
    /// Metadata, including the tier/compression tag.
    pub meta: SaveMeta,
    /// Encoded payload bytes.
    pub payload: Vec<u8>,
}

/// Reduced session carried by a summarized save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SummarizedState {
    /// The player, traits included.
    pub player: Player,
    /// Current story, content cut to the preview length.
    pub story: StorySegment,
    /// Capped available choices.
    pub choices: Vec<ChoiceOption>,
    /// Retained memories, best ranked first.
    pub memories: Vec<MemoryRecord>,
    /// Narrative digest.
    pub digest: String,
    /// Progression with capped events and inventory.
    pub progression: Progression,
    /// Memories in the live session at save time.
    pub original_memory_count: usize,
    /// Completed events in the live session at save time.
    pub original_event_count: usize,
}

impl SummarizedState {
    /// Rebuild a playable (reduced) session from the summary.
    #[must_use]
    pub fn into_session(self) -> SessionState {
        SessionState {
            player: self.player,
            story: self.story,
            choices: self.choices,
            memories: self.memories.into_iter().collect::<MemoryArena>(),
            progression: self.progression,
        }
    }
}

/// A decoded payload, tagged by tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SavePayload {
    /// Lossless session.
    Full(SessionState),
    /// Reduced session.
    Summarized(SummarizedState),
}

impl SavePayload {
    /// Tier of this payload.
    #[must_use]
    pub fn tier(&self) -> Tier {
        match self {
            Self::Full(_) => Tier::Full,
            Self::Summarized(_) => Tier::Summarized,
        }
    }

    /// Turn the payload into a live session.
    #[must_use]
    pub fn into_session(self) -> SessionState {
        match self {
            Self::Full(session) => session,
            Self::Summarized(summary) => summary.into_session(),
        }
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Build the summarized form of a session.
#[must_use]
pub fn summarize(session: &SessionState, config: &ChronicleConfig) -> SummarizedState {
    let arena = session.memories.as_slice();
    let view = retention::retain(arena, config.retention.max_memories);
    let digest = digest::compile(&session.progression, view.records(arena), &config.digest);

    let memories: Vec<MemoryRecord> = view.records(arena).cloned().collect();

    let tiering = &config.tiering;
    let source = &session.progression;
    let progression = Progression {
        current_location: source.current_location.clone(),
        completed_events: source.recent_events(tiering.recent_events).to_vec(),
        relationships: source.relationships.clone(),
        inventory: source.inventory.iter().take(tiering.max_inventory).cloned().collect(),
    };

    let mut story = session.story.clone();
    story.content = truncate_with_marker(&story.content, tiering.story_preview_chars);

    SummarizedState {
        player: session.player.clone(),
        story,
        choices: session.choices.iter().take(tiering.max_choices).cloned().collect(),
        memories,
        digest,
        progression,
        original_memory_count: arena.len(),
        original_event_count: source.completed_events.len(),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| ChronicleError::Encoding(e.to_string()))
}

fn gzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let to_err = |e: std::io::Error| ChronicleError::Encoding(format!("gzip: {e}"));
    let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 4), Compression::default());
    encoder.write_all(bytes).map_err(to_err)?;
    encoder.finish().map_err(to_err)
}

fn gunzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut out)
        .map_err(|e| ChronicleError::Encoding(format!("gunzip: {e}")))?;
    Ok(out)
}

/// SHA-256 of `bytes` as lowercase hex.
#[must_use]
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Encode a session into a save record.
///
/// The tier follows `estimate.should_summarize`; compression follows the
/// payload size.
///
/// # Errors
///
/// Only [`ChronicleError::Encoding`] if the serializer itself fails, which
/// the model types never trigger.
pub fn encode(
    session: &SessionState,
    save_name: &str,
    estimate: &SizeEstimate,
    config: &ChronicleConfig,
) -> Result<SaveRecord> {
    let (tier, raw, kept_memory_count) = if estimate.should_summarize {
        let summary = summarize(session, config);
        let kept = summary.memories.len();
        (Tier::Summarized, to_json(&summary)?, kept)
    } else {
        (Tier::Full, to_json(session)?, session.memories.len())
    };

    let size_bytes = raw.len();
    let compressed = size_bytes > config.tiering.compress_threshold_bytes;
    let payload = if compressed { gzip(&raw)? } else { raw };

    let meta = SaveMeta {
        save_id: SaveId::new(),
        player_id: session.player.id,
        player_name: session.player.name.clone(),
        save_name: save_name.to_owned(),
        created_at: Utc::now(),
        tier,
        compressed,
        size_bytes,
        stored_bytes: payload.len(),
        checksum: checksum(&payload),
        original_memory_count: session.memories.len(),
        kept_memory_count,
    };

    info!(
        player = %meta.player_id,
        save = %meta.save_id,
        tier = %tier,
        compressed,
        size_bytes,
        stored_bytes = meta.stored_bytes,
        "Encoded save"
    );

    Ok(SaveRecord { meta, payload })
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a record's payload, branching on its own `(tier, compressed)` tag.
///
/// # Errors
///
/// Returns [`ChronicleError::Encoding`] on checksum mismatch, a payload that
/// does not decompress, a decompressed length that disagrees with
/// `size_bytes`, or JSON whose shape does not match the tier.
pub fn decode(record: &SaveRecord) -> Result<SavePayload> {
    let meta = &record.meta;
    let actual = checksum(&record.payload);
    if actual != meta.checksum {
        return Err(ChronicleError::Encoding(format!(
            "checksum mismatch for save {}: expected {}, found {actual}",
            meta.save_id, meta.checksum
        )));
    }

    let raw = if meta.compressed {
        gunzip(&record.payload)?
    } else {
        record.payload.clone()
    };
    if raw.len() != meta.size_bytes {
        return Err(ChronicleError::Encoding(format!(
            "payload length {} does not match recorded size {}",
            raw.len(),
            meta.size_bytes
        )));
    }

    let payload = match meta.tier {
        Tier::Full => serde_json::from_slice::<SessionState>(&raw).map(SavePayload::Full),
        Tier::Summarized => serde_json::from_slice::<SummarizedState>(&raw).map(SavePayload::Summarized),
    }
    .map_err(|e| ChronicleError::Encoding(format!("{} payload: {e}", meta.tier)))?;

    debug!(save = %meta.save_id, tier = %meta.tier, compressed = meta.compressed, "Decoded save");
    Ok(payload)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::estimate_size;
    use crate::types::MemoryKind;

    fn estimate(session: &SessionState, config: &ChronicleConfig) -> SizeEstimate {
        estimate_size(session, &config.estimate, &config.retention)
    }

    fn forced(summarize: bool, compress: bool) -> ChronicleConfig {
        let mut config = ChronicleConfig::default();
        config.estimate.summarize_threshold_bytes = if summarize { 0 } else { usize::MAX };
        config.tiering.compress_threshold_bytes = if compress { 0 } else { usize::MAX };
        config
    }

    fn busy_session() -> SessionState {
        let mut session = SessionState::new("Ash", "Pallet Town");
        for i in 0..80 {
            let kind = if i % 10 == 0 { MemoryKind::Promise } else { MemoryKind::General };
            session.record_memory(kind, format!("memory {i}"));
        }
        session.progression.completed_events = (0..12).map(|i| format!("event {i}")).collect();
        session.progression.inventory = (0..30).map(|i| format!("item {i:02}")).collect();
        session.story.content = "long ".repeat(100);
        session
    }

    #[test]
    fn small_session_round_trips_full() {
        let config = ChronicleConfig::default();
        let session = SessionState::new("Ash", "Pallet Town");
        let record = encode(&session, "slot", &estimate(&session, &config), &config).expect("encode");
        assert_eq!(record.meta.tier, Tier::Full);
        assert!(!record.meta.compressed);
        assert_eq!(record.meta.stored_bytes, record.payload.len());

        let decoded = decode(&record).expect("decode");
        assert_eq!(decoded, SavePayload::Full(session));
    }

    #[test]
    fn summarized_payload_is_bounded() {
        let config = forced(true, false);
        let session = busy_session();
        let record = encode(&session, "slot", &estimate(&session, &config), &config).expect("encode");
        assert_eq!(record.meta.tier, Tier::Summarized);
        assert_eq!(record.meta.original_memory_count, 80);
        assert_eq!(record.meta.kept_memory_count, 50);

        let SavePayload::Summarized(summary) = decode(&record).expect("decode") else {
            panic!("expected summarized payload");
        };
        assert_eq!(summary.memories.len(), 50);
        assert_eq!(summary.progression.completed_events.len(), 5);
        assert_eq!(summary.progression.completed_events[0], "event 7");
        assert_eq!(summary.progression.inventory.len(), 20);
        assert_eq!(summary.original_event_count, 12);
        assert!(summary.story.content.chars().count() <= 200);
        assert!(!summary.digest.is_empty());
        // All 8 promises survive.
        assert_eq!(summary.memories.iter().filter(|m| m.kind == MemoryKind::Promise).count(), 8);
    }

    #[test]
    fn compression_is_transparent() {
        let session = busy_session();
        for summarize_tier in [false, true] {
            let plain_cfg = forced(summarize_tier, false);
            let gz_cfg = forced(summarize_tier, true);
            let plain = encode(&session, "a", &estimate(&session, &plain_cfg), &plain_cfg).expect("plain");
            let gz = encode(&session, "b", &estimate(&session, &gz_cfg), &gz_cfg).expect("gz");
            assert!(!plain.meta.compressed);
            assert!(gz.meta.compressed);
            assert_eq!(plain.meta.size_bytes, gz.meta.size_bytes);
            assert_eq!(decode(&plain).expect("decode plain"), decode(&gz).expect("decode gz"));
        }
    }

    #[test]
    fn corrupted_payload_is_rejected() {
        let config = ChronicleConfig::default();
        let session = SessionState::new("Ash", "Pallet Town");
        let mut record = encode(&session, "slot", &estimate(&session, &config), &config).expect("encode");
        record.payload[0] ^= 0xFF;
        assert!(matches!(decode(&record), Err(ChronicleError::Encoding(_))));
    }

    #[test]
    fn tier_tag_mismatch_is_rejected() {
        let config = forced(true, false);
        let session = busy_session();
        let mut record = encode(&session, "slot", &estimate(&session, &config), &config).expect("encode");
        record.meta.tier = Tier::Full;
        let err = decode(&record).expect_err("shape mismatch");
        assert!(matches!(err, ChronicleError::Encoding(_)));

        let config = forced(false, false);
        let mut record = encode(&session, "slot", &estimate(&session, &config), &config).expect("encode");
        record.meta.tier = Tier::Summarized;
        assert!(matches!(decode(&record), Err(ChronicleError::Encoding(_))));
    }

    #[test]
    fn compressed_flag_mismatch_is_rejected() {
        let config = forced(false, false);
        let session = busy_session();
        let mut record = encode(&session, "slot", &estimate(&session, &config), &config).expect("encode");
        record.meta.compressed = true;
        assert!(matches!(decode(&record), Err(ChronicleError::Encoding(_))));

        let config = forced(false, true);
        let mut record = encode(&session, "slot", &estimate(&session, &config), &config).expect("encode");
        record.meta.compressed = false;
        assert!(matches!(decode(&record), Err(ChronicleError::Encoding(_))));
    }

    #[test]
    fn summarized_session_keeps_retention_order() {
        let config = forced(true, false);
        let session = busy_session();
        let record = encode(&session, "slot", &estimate(&session, &config), &config).expect("encode");
        let restored = decode(&record).expect("decode").into_session();

        let arena = session.memories.as_slice();
        let view = retention::retain(arena, 50);
        let expected: Vec<&MemoryRecord> = view.records(arena).collect();
        let actual: Vec<&MemoryRecord> = restored.memories.iter().collect();
        assert_eq!(actual, expected);
        assert_eq!(restored.player, session.player);
        assert_eq!(restored.progression.relationships, session.progression.relationships);
    }
}
