//! Context window assembler.
//!
//! Builds the token-bounded view of a live session that is handed to the
//! generation backend. The view has a floor that is always present and a
//! set of reducible fields that are trimmed, lowest priority first, until
//! the estimate fits the budget:
//!
//! ```text
//! floor        location, player name, story title, traits, choices
//! reducible    story_preview > promises > relationships > recent_events
//!              (trimmed right to left)
//! ```
//!
//! Tokens are estimated as `serialized chars / chars_per_token`, rounded up.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ContextConfig;
use crate::retention::top_of_kind;
use crate::session::SessionState;
use crate::text::{char_len, prefix_chars, truncate_with_marker};
use crate::types::{MemoryKind, PersonalityTraits};

/// A choice as presented to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextChoice {
    /// Display text.
    pub text: String,
    /// Trait deltas.
    pub effects: BTreeMap<String, i64>,
}

/// Content of a context window; the part that is measured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextWindow {
    /// Where the player is.
    pub current_location: String,
    /// Player display name.
    pub player_name: String,
    /// Title of the current segment.
    pub story_title: String,
    /// Current trait values.
    pub personality_traits: PersonalityTraits,
    /// Options on offer.
    pub available_choices: Vec<ContextChoice>,
    /// Leading slice of the current segment's content.
    pub story_preview: String,
    /// Top promise contents, best ranked first.
    pub promises: Vec<String>,
    /// Top relationship contents, best ranked first.
    pub relationships: Vec<String>,
    /// Most recent completed events, oldest first.
    pub recent_events: Vec<String>,
}

impl ContextWindow {
    /// Estimated token count of this window.
    #[must_use]
    pub fn estimate_tokens(&self, chars_per_token: usize) -> usize {
        let chars = serde_json::to_string(self).map_or(0, |s| char_len(&s));
        chars.div_ceil(chars_per_token.max(1))
    }

    /// Trim the lowest-priority populated field by one step.
    /// Returns `false` once only the floor is left.
    fn reduce_once(&mut self) -> bool {
        if !self.recent_events.is_empty() {
            self.recent_events.remove(0);
            return true;
        }
        if self.relationships.pop().is_some() || self.promises.pop().is_some() {
            return true;
        }
        if self.story_preview.is_empty() {
            return false;
        }
        let half = char_len(&self.story_preview) / 2;
        self.story_preview = prefix_chars(&self.story_preview, half).to_owned();
        true
    }

    /// Whether every reducible field is empty.
    #[must_use]
    pub fn is_floor_only(&self) -> bool {
        self.story_preview.is_empty()
            && self.promises.is_empty()
            && self.relationships.is_empty()
            && self.recent_events.is_empty()
    }
}

/// A context window plus its budget bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextView {
    /// The window content.
    #[serde(flatten)]
    pub window: ContextWindow,
    /// Token estimate of `window`.
    pub estimated_tokens: usize,
    /// Budget the view was built for.
    pub token_budget: usize,
    /// Set when even the floor exceeds the budget.
    pub over_budget: bool,
}

/// Assemble the untrimmed window for a session.
#[must_use]
pub fn full_window(session: &SessionState, config: &ContextConfig) -> ContextWindow {
    let memories = session.memories.as_slice();
    let contents = |kind: MemoryKind, limit: usize| -> Vec<String> {
        top_of_kind(memories, kind, limit).into_iter().map(|m| m.content.clone()).collect()
    };

    ContextWindow {
        current_location: session.progression.current_location.clone(),
        player_name: session.player.name.clone(),
        story_title: session.story.title.clone(),
        personality_traits: session.player.traits.clone(),
        available_choices: session
            .choices
            .iter()
            .map(|c| ContextChoice {
                text: c.text.clone(),
                effects: c.effects.clone(),
            })
            .collect(),
        story_preview: truncate_with_marker(&session.story.content, config.story_preview_chars),
        promises: contents(MemoryKind::Promise, config.max_promises),
        relationships: contents(MemoryKind::Relationship, config.max_relationships),
        recent_events: session.progression.recent_events(config.recent_events).to_vec(),
    }
}

/// Build a context view that fits `token_budget` where possible.
///
/// Never fails. If the floor alone is over budget it is returned with
/// `over_budget` set.
#[must_use]
pub fn assemble(session: &SessionState, token_budget: usize, config: &ContextConfig) -> ContextView {
    let mut window = full_window(session, config);
    let mut estimated_tokens = window.estimate_tokens(config.chars_per_token);
    let mut steps = 0_usize;

    while estimated_tokens > token_budget && window.reduce_once() {
        steps += 1;
        estimated_tokens = window.estimate_tokens(config.chars_per_token);
    }

    let over_budget = estimated_tokens > token_budget;
    if over_budget {
        warn!(
            player = %session.player.id,
            token_budget,
            estimated_tokens,
            "Context floor exceeds token budget"
        );
    } else {
        debug!(player = %session.player.id, token_budget, estimated_tokens, steps, "Context assembled");
    }

    ContextView {
        window,
        estimated_tokens,
        token_budget,
        over_budget,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MemoryRecord;
    use chrono::{Duration, TimeZone, Utc};

    fn rich_session() -> SessionState {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("valid date");
        let mut session = SessionState::new("Ash", "Pallet Town");
        session.story.content = "The wind carries the smell of the sea. ".repeat(10);
        for i in 0..5 {
            let at = base + Duration::minutes(i);
            let memories = [
                (MemoryKind::Promise, format!("promise number {i} to keep")),
                (MemoryKind::Relationship, format!("relationship number {i} formed")),
                (MemoryKind::General, format!("general {i}")),
            ];
            for (kind, content) in memories {
                session.memories.push(MemoryRecord::at(kind, content, at));
            }
        }
        session.progression.completed_events = (0..6)
            .map(|i| format!("completed a long and eventful step number {i} of the journey"))
            .collect();
        session
    }

    #[test]
    fn generous_budget_keeps_everything() {
        let config = ContextConfig::default();
        let view = assemble(&rich_session(), 100_000, &config);
        assert!(!view.over_budget);
        let w = &view.window;
        assert_eq!(char_len(&w.story_preview), 150);
        assert_eq!(w.promises.len(), 3);
        assert_eq!(w.promises[0], "promise number 4 to keep");
        assert_eq!(w.relationships.len(), 3);
        assert_eq!(w.recent_events.len(), 3);
        assert!(w.recent_events[2].contains("number 5"));
        assert_eq!(view.estimated_tokens, w.estimate_tokens(config.chars_per_token));
    }

    #[test]
    fn zero_budget_returns_floor_over_budget() {
        let session = rich_session();
        let view = assemble(&session, 0, &ContextConfig::default());
        assert!(view.over_budget);
        assert!(view.window.is_floor_only());
        assert_eq!(view.window.player_name, "Ash");
        assert_eq!(view.window.current_location, "Pallet Town");
        assert_eq!(view.window.available_choices.len(), 2);
        assert!(view.estimated_tokens > 0);
    }

    #[test]
    fn recent_events_go_first() {
        let config = ContextConfig::default();
        let session = rich_session();
        let mut target = full_window(&session, &config);
        target.recent_events.truncate(0);
        let budget = target.estimate_tokens(config.chars_per_token);

        let view = assemble(&session, budget, &config);
        assert!(!view.over_budget);
        assert!(view.window.recent_events.is_empty());
        assert_eq!(view.window.relationships.len(), 3);
        assert_eq!(view.window.promises.len(), 3);
        assert_eq!(char_len(&view.window.story_preview), 150);
    }

    #[test]
    fn oldest_event_dropped_before_newer() {
        let config = ContextConfig::default();
        let session = rich_session();
        let mut target = full_window(&session, &config);
        target.recent_events.remove(0);
        let budget = target.estimate_tokens(config.chars_per_token);

        let view = assemble(&session, budget, &config);
        assert_eq!(view.window.recent_events.len(), 2);
        assert!(view.window.recent_events[0].contains("number 4"));
    }

    #[test]
    fn relationships_drop_lowest_ranked_before_promises() {
        let config = ContextConfig::default();
        let session = rich_session();
        let mut target = full_window(&session, &config);
        target.recent_events.clear();
        target.relationships.pop();
        let budget = target.estimate_tokens(config.chars_per_token);

        let view = assemble(&session, budget, &config);
        assert_eq!(view.window.relationships.len(), 2);
        assert_eq!(view.window.relationships[0], "relationship number 4 formed");
        assert_eq!(view.window.promises.len(), 3);
    }

    #[test]
    fn story_preview_is_halved_last() {
        let mut window = full_window(&rich_session(), &ContextConfig::default());
        window.recent_events.clear();
        window.relationships.clear();
        window.promises.clear();
        assert!(window.reduce_once());
        assert_eq!(char_len(&window.story_preview), 75);
        while window.reduce_once() {}
        assert!(window.is_floor_only());
    }

    #[test]
    fn serialized_view_is_flat() {
        let view = assemble(&rich_session(), 100_000, &ContextConfig::default());
        let json = serde_json::to_value(&view).expect("serialize");
        assert!(json.get("player_name").is_some());
        assert!(json.get("estimated_tokens").is_some());
        assert!(json.get("window").is_none());
    }
}
