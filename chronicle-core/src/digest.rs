//! Narrative digest compiler.
//!
//! Folds progression and retained memories into one bounded line of text:
//!
//! ```text
//! Location: Viridian City | Recent: a→b→c | Promises: p1; p2 | Relationships: r1; r2
//! ```
//!
//! Promises and relationships are memory contents, best ranked first.
//!
//! Sections whose source is empty are left out. The whole digest is capped
//! at `max_digest_length` characters, marker included.

use crate::config::DigestConfig;
use crate::retention::top_of_kind;
use crate::text::{prefix_chars, truncate_with_marker};
use crate::types::{MemoryKind, MemoryRecord, Progression};

const SECTION_SEPARATOR: &str = " | ";
const EVENT_SEPARATOR: &str = "→";
const ITEM_SEPARATOR: &str = "; ";

/// Compile the digest for a progression and its retained memories.
///
/// `retained` should be the output of [`crate::retention::retain`]; promises
/// and relationships are taken in ranking order from it.
#[must_use]
pub fn compile<'a, I>(progression: &Progression, retained: I, config: &DigestConfig) -> String
where
    I: IntoIterator<Item = &'a MemoryRecord>,
{
    let retained: Vec<&MemoryRecord> = retained.into_iter().collect();
    let mut sections: Vec<String> = Vec::with_capacity(4);

    if !progression.current_location.is_empty() {
        sections.push(format!("Location: {}", progression.current_location));
    }

    let recent = progression.recent_events(config.recent_events);
    if !recent.is_empty() {
        sections.push(format!("Recent: {}", recent.join(EVENT_SEPARATOR)));
    }

    let promises: Vec<&str> = top_of_kind(retained.iter().copied(), MemoryKind::Promise, config.max_promises)
        .into_iter()
        .map(|m| prefix_chars(&m.content, config.promise_chars))
        .collect();
    if !promises.is_empty() {
        sections.push(format!("Promises: {}", promises.join(ITEM_SEPARATOR)));
    }

    let relationships: Vec<&str> = top_of_kind(retained.iter().copied(), MemoryKind::Relationship, config.max_relationships)
        .into_iter()
        .map(|m| m.content.as_str())
        .collect();
    if !relationships.is_empty() {
        sections.push(format!("Relationships: {}", relationships.join(ITEM_SEPARATOR)));
    }

    truncate_with_marker(&sections.join(SECTION_SEPARATOR), config.max_digest_length)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
