//! Live session state: the unit of truth every other structure is derived
//! from.
//!
//! Memories live in an append-only [`MemoryArena`]. Ranking and retention
//! never edit the arena; they compute index views over it (see
//! [`crate::retention`]), so a live session keeps its full history while
//! saves and context windows stay bounded.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ChronicleError, Resource, Result};
use crate::types::{
    ChoiceId, ChoiceOption, MemoryId, MemoryKind, MemoryRecord, PersonalityTraits, Player, PlayerId,
    Progression, StorySegment,
};

// ---------------------------------------------------------------------------
// Memory arena
// ---------------------------------------------------------------------------

/// Append-only store of memories, ordered by insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryArena(Vec<MemoryRecord>);

impl MemoryArena {
    /// Empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record, returning its arena index.
    pub fn push(&mut self, record: MemoryRecord) -> usize {
        self.0.push(record);
        self.0.len() - 1
    }

    /// Record at an arena index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&MemoryRecord> {
        self.0.get(index)
    }

    /// All records in insertion order.
    #[must_use]
    pub fn as_slice(&self) -> &[MemoryRecord] {
        &self.0
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, MemoryRecord> {
        self.0.iter()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the arena is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<MemoryRecord> for MemoryArena {
    fn from_iter<I: IntoIterator<Item = MemoryRecord>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a MemoryArena {
    type Item = &'a MemoryRecord;
    type IntoIter = std::slice::Iter<'a, MemoryRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ---------------------------------------------------------------------------
// Generation outcome
// ---------------------------------------------------------------------------

/// What the narrative backend hands back after a generation call.
///
/// The engine never calls the backend itself; callers feed its result in
/// through [`SessionState::advance`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOutcome {
    /// The next story segment, if the backend produced one.
    pub story: Option<StorySegment>,
    /// The next set of choices.
    #[serde(default)]
    pub choices: Vec<ChoiceOption>,
    /// New current location, if the story moved.
    #[serde(default)]
    pub location: Option<String>,
    /// Promises surfaced by the new segment.
    #[serde(default)]
    pub promises: Vec<String>,
    /// Relationship developments surfaced by the new segment.
    #[serde(default)]
    pub relationships: Vec<String>,
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// One player's complete narrative state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionState {
    /// The owning player.
    pub player: Player,
    /// Segment currently shown.
    pub story: StorySegment,
    /// Options the player may pick next, in display order.
    pub choices: Vec<ChoiceOption>,
    /// Every memory ever recorded, oldest first.
    pub memories: MemoryArena,
    /// World progression.
    pub progression: Progression,
}

impl SessionState {
    /// Start a brand-new session with balanced traits and an opening scene.
    #[must_use]
    pub fn new(player_name: impl Into<String>, location: impl Into<String>) -> Self {
        let name = player_name.into();
        let location = location.into();
        let story = StorySegment::new(
            "Your Adventure Begins",
            format!("Welcome, {name}! You wake up in {location}, ready to begin your adventure."),
            location.clone(),
        );
        Self {
            player: Player {
                id: PlayerId::new(),
                name,
                traits: PersonalityTraits::balanced(),
            },
            story,
            choices: vec![
                ChoiceOption::new("Look around before setting out").with_effect("curiosity", 1),
                ChoiceOption::new("Head straight for the road").with_effect("courage", 1),
            ],
            memories: MemoryArena::new(),
            progression: Progression::starting_at(location),
        }
    }

    /// The owning player's id.
    #[must_use]
    pub fn player_id(&self) -> PlayerId {
        self.player.id
    }

    /// Append a memory stamped with the current time.
    pub fn record_memory(&mut self, kind: MemoryKind, content: impl Into<String>) -> MemoryId {
        let record = MemoryRecord::new(kind, content);
        let id = record.id;
        self.memories.push(record);
        id
    }

    /// Set a personality trait, clamped to `[0, 10]`.
    pub fn set_trait(&mut self, name: impl Into<String>, value: i64) {
        self.player.traits.set(name, value);
    }

    /// Apply one of the available choices.
    ///
    /// Each effect is applied as a clamped delta to traits the player
    /// already has; the choice text is appended to the completed events.
    ///
    /// # Errors
    ///
    /// Returns [`ChronicleError::NotFound`] if `choice_id` is not among the
    /// available choices. The session is left untouched in that case.
    pub fn apply_choice(&mut self, choice_id: ChoiceId) -> Result<ChoiceOption> {
        let choice = self
            .choices
            .iter()
            .find(|c| c.id == choice_id)
            .cloned()
            .ok_or_else(|| ChronicleError::not_found(Resource::Choice, choice_id))?;

        for (trait_name, delta) in &choice.effects {
            if let Some(value) = self.player.traits.apply_delta(trait_name, *delta) {
                debug!(player = %self.player.id, trait_name = %trait_name, value, "Trait updated");
            }
        }
        self.progression.completed_events.push(choice.text.clone());
        Ok(choice)
    }

    /// Install a generation outcome as the current story state.
    pub fn advance(&mut self, outcome: GenerationOutcome) {
        if let Some(location) = outcome.location {
            self.progression.current_location = location;
        }
        if let Some(story) = outcome.story {
            self.story = story;
        }
        self.choices = outcome.choices;
        for promise in outcome.promises {
            self.record_memory(MemoryKind::Promise, promise);
        }
        for relationship in outcome.relationships {
            self.record_memory(MemoryKind::Relationship, relationship);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
