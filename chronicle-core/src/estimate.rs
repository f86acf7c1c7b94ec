//! Session size estimator.
//!
//! Measures the serialized size of each session component. The result
//! drives the tiering decision (`should_summarize`); the suggestions are
//! advisory strings for observability and never affect control flow.

use serde::Serialize;

use crate::config::{EstimateConfig, RetentionConfig};
use crate::session::SessionState;

/// Serialized byte size of each session component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ComponentSizes {
    /// Player record.
    pub player: usize,
    /// Current story segment.
    pub story: usize,
    /// Available choices.
    pub choices: usize,
    /// Full memory arena.
    pub memories: usize,
    /// Progression.
    pub progression: usize,
}

impl ComponentSizes {
    /// Sum of all components.
    #[must_use]
    pub fn total(&self) -> usize {
        self.player + self.story + self.choices + self.memories + self.progression
    }
}

/// Output of [`estimate_size`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizeEstimate {
    /// Per-component sizes.
    pub components: ComponentSizes,
    /// Sum of the components, in bytes.
    pub total_bytes: usize,
    /// Memories in the arena.
    pub memory_count: usize,
    /// Available choices.
    pub choice_count: usize,
    /// Completed events.
    pub completed_events: usize,
    /// Whether the session should be saved in the summarized tier.
    pub should_summarize: bool,
    /// Advisory notes.
    pub suggestions: Vec<String>,
}

fn json_len<T: Serialize + ?Sized>(value: &T) -> usize {
    // Model types have string map keys only; serialization cannot fail.
    serde_json::to_vec(value).map_or(0, |bytes| bytes.len())
}

/// Estimate the persisted size of a session. Pure; performs no I/O.
#[must_use]
pub fn estimate_size(
    session: &SessionState,
    config: &EstimateConfig,
    retention: &RetentionConfig,
) -> SizeEstimate {
    let components = ComponentSizes {
        player: json_len(&session.player),
        story: json_len(&session.story),
        choices: json_len(&session.choices),
        memories: json_len(&session.memories),
        progression: json_len(&session.progression),
    };
    let total_bytes = components.total();
    let memory_count = session.memories.len();
    let should_summarize = total_bytes > config.summarize_threshold_bytes;

    let mut suggestions = Vec::new();
    if components.memories > config.memory_bytes_advisory {
        suggestions.push(format!(
            "consider limiting memories to the {} most important",
            retention.max_memories
        ));
    }
    if should_summarize {
        suggestions.push("consider summarized storage".to_string());
    }
    if memory_count > config.memory_count_advisory {
        suggestions.push("memory count high, consider cleanup".to_string());
    }

    SizeEstimate {
        components,
        total_bytes,
        memory_count,
        choice_count: session.choices.len(),
        completed_events: session.progression.completed_events.len(),
        should_summarize,
        suggestions,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MemoryKind;

    #[test]
    fn small_session_stays_full() {
        let session = SessionState::new("Ash", "Pallet Town");
        let estimate = estimate_size(&session, &EstimateConfig::default(), &RetentionConfig::default());
        assert!(!estimate.should_summarize);
        assert!(estimate.suggestions.is_empty());
        assert_eq!(estimate.total_bytes, estimate.components.total());
        assert!(estimate.components.player > 0);
        assert_eq!(estimate.choice_count, 2);
    }

    #[test]
    fn threshold_is_strictly_greater_than() {
        let session = SessionState::new("Ash", "Pallet Town");
        let base = estimate_size(&session, &EstimateConfig::default(), &RetentionConfig::default());
        let at_threshold = EstimateConfig {
            summarize_threshold_bytes: base.total_bytes,
            ..EstimateConfig::default()
        };
        assert!(!estimate_size(&session, &at_threshold, &RetentionConfig::default()).should_summarize);

        let below = EstimateConfig {
            summarize_threshold_bytes: base.total_bytes - 1,
            ..EstimateConfig::default()
        };
        assert!(estimate_size(&session, &below, &RetentionConfig::default()).should_summarize);
    }

    #[test]
    fn large_memory_log_triggers_suggestions() {
        let mut session = SessionState::new("Ash", "Pallet Town");
        for i in 0..400 {
            session.record_memory(MemoryKind::General, format!("{i}: {}", "a long remembered moment ".repeat(12)));
        }
        let estimate = estimate_size(&session, &EstimateConfig::default(), &RetentionConfig::default());
        assert!(estimate.should_summarize);
        assert_eq!(estimate.memory_count, 400);
        assert_eq!(estimate.suggestions.len(), 3);
        assert!(estimate.suggestions[0].contains("50 most important"));
    }

    #[test]
    fn estimation_is_deterministic() {
        let mut session = SessionState::new("Misty", "Cerulean City");
        session.record_memory(MemoryKind::Promise, "Pay for the bike");
        let a = estimate_size(&session, &EstimateConfig::default(), &RetentionConfig::default());
        let b = estimate_size(&session, &EstimateConfig::default(), &RetentionConfig::default());
        assert_eq!(a, b);
    }
}
