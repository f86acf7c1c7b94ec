//! Core type definitions for the Chronicle compaction engine.
//!
//! Everything here is plain serializable data. Maps and sets are ordered
//! (`BTreeMap` / `BTreeSet`) so that serialized sizes and payload bytes are
//! reproducible for identical sessions.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a player (and therefore for their session).
    PlayerId
);
uuid_id!(
    /// Unique identifier for a persisted save.
    SaveId
);
uuid_id!(
    /// Unique identifier for a memory record.
    MemoryId
);
uuid_id!(
    /// Unique identifier for a story segment.
    StoryId
);
uuid_id!(
    /// Unique identifier for a choice option.
    ChoiceId
);

// ---------------------------------------------------------------------------
// Personality Traits
// ---------------------------------------------------------------------------

/// Lowest value a personality trait may hold.
pub const TRAIT_MIN: i64 = 0;
/// Highest value a personality trait may hold.
pub const TRAIT_MAX: i64 = 10;

/// Trait set given to a brand-new player.
pub const DEFAULT_TRAITS: [&str; 5] = ["friendship", "courage", "curiosity", "wisdom", "determination"];

/// Named personality traits, each an integer in `[0, 10]`.
///
/// Values are clamped on every write, including deserialization, so a
/// tampered or hand-edited save can never carry an out-of-range trait.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, i64>")]
pub struct PersonalityTraits(BTreeMap<String, u8>);

impl PersonalityTraits {
    /// Empty trait set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The default trait set, every trait at the midpoint.
    #[must_use]
    pub fn balanced() -> Self {
        let mut traits = Self::new();
        for name in DEFAULT_TRAITS {
            traits.set(name, 5);
        }
        traits
    }

    /// Set a trait, clamping the value to `[0, 10]`.
    pub fn set(&mut self, name: impl Into<String>, value: i64) {
        self.0.insert(name.into(), clamp_trait(value));
    }

    /// Apply a signed delta to an existing trait. Unknown traits are ignored.
    ///
    /// Returns the new value if the trait exists.
    pub fn apply_delta(&mut self, name: &str, delta: i64) -> Option<u8> {
        let slot = self.0.get_mut(name)?;
        *slot = clamp_trait(i64::from(*slot).saturating_add(delta));
        Some(*slot)
    }

    /// Current value of a trait.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<u8> {
        self.0.get(name).copied()
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u8)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of traits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no traits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, i64>> for PersonalityTraits {
    fn from(raw: BTreeMap<String, i64>) -> Self {
        Self(raw.into_iter().map(|(k, v)| (k, clamp_trait(v))).collect())
    }
}

fn clamp_trait(value: i64) -> u8 {
    // Clamped into 0..=10, so the narrowing cast is lossless.
    value.clamp(TRAIT_MIN, TRAIT_MAX) as u8
}

// ---------------------------------------------------------------------------
// Memories
// ---------------------------------------------------------------------------

/// Category of a narrative memory. Drives retention priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// A promise the player made or received.
    Promise,
    /// A relationship development.
    Relationship,
    /// Something the player accomplished.
    Achievement,
    /// Something the player learned.
    Lesson,
    /// Anything else.
    General,
}

impl MemoryKind {
    /// Retention weight. Higher is kept first.
    #[must_use]
    pub const fn weight(self) -> u8 {
        match self {
            Self::Promise => 4,
            Self::Relationship => 3,
            Self::Achievement | Self::Lesson => 2,
            Self::General => 1,
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Promise => write!(f, "promise"),
            Self::Relationship => write!(f, "relationship"),
            Self::Achievement => write!(f, "achievement"),
            Self::Lesson => write!(f, "lesson"),
            Self::General => write!(f, "general"),
        }
    }
}

/// A single memory. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique identifier.
    pub id: MemoryId,
    /// What is remembered.
    pub content: String,
    /// Category, used for ranking.
    pub kind: MemoryKind,
    /// Wall-clock creation time.
    pub created_at: DateTime<Utc>,
}

impl MemoryRecord {
    /// Create a memory stamped with the current time.
    #[must_use]
    pub fn new(kind: MemoryKind, content: impl Into<String>) -> Self {
        Self::at(kind, content, Utc::now())
    }

    /// Create a memory with an explicit creation time.
    #[must_use]
    pub fn at(kind: MemoryKind, content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: MemoryId::new(),
            content: content.into(),
            kind,
            created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Story
// ---------------------------------------------------------------------------

/// One option the player may pick next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    /// Unique identifier.
    pub id: ChoiceId,
    /// Text shown to the player.
    pub text: String,
    /// Trait deltas applied when chosen.
    #[serde(default)]
    pub effects: BTreeMap<String, i64>,
}

impl ChoiceOption {
    /// Create a choice with no effects.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: ChoiceId::new(),
            text: text.into(),
            effects: BTreeMap::new(),
        }
    }

    /// Add a trait delta.
    #[must_use]
    pub fn with_effect(mut self, trait_name: impl Into<String>, delta: i64) -> Self {
        self.effects.insert(trait_name.into(), delta);
        self
    }
}

/// The narrative segment currently shown to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorySegment {
    /// Unique identifier.
    pub id: StoryId,
    /// Segment title.
    pub title: String,
    /// Full narrative text.
    pub content: String,
    /// Where the segment takes place.
    pub location: String,
}

impl StorySegment {
    /// Create a story segment with a fresh id.
    #[must_use]
    pub fn new(title: impl Into<String>, content: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            id: StoryId::new(),
            title: title.into(),
            content: content.into(),
            location: location.into(),
        }
    }
}

/// World progression for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progression {
    /// Where the player currently is.
    pub current_location: String,
    /// Events completed so far, oldest first.
    #[serde(default)]
    pub completed_events: Vec<String>,
    /// Named relationships and their descriptions.
    #[serde(default)]
    pub relationships: BTreeMap<String, String>,
    /// Items carried.
    #[serde(default)]
    pub inventory: BTreeSet<String>,
}

impl Progression {
    /// Fresh progression at a starting location.
    #[must_use]
    pub fn starting_at(location: impl Into<String>) -> Self {
        Self {
            current_location: location.into(),
            ..Self::default()
        }
    }

    /// The `n` most recent completed events, oldest first.
    #[must_use]
    pub fn recent_events(&self, n: usize) -> &[String] {
        let start = self.completed_events.len().saturating_sub(n);
        &self.completed_events[start..]
    }
}

/// The player who owns a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Unique identifier.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Personality traits, clamped to `[0, 10]`.
    pub traits: PersonalityTraits,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
