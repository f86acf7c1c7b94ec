//! Shared fixtures for the Chronicle benchmark suite.

use chrono::{Duration, TimeZone, Utc};

use chronicle_core::session::SessionState;
use chronicle_core::types::{ChoiceOption, MemoryKind, MemoryRecord};

/// A session with `memories` records, one Promise in every ten, a long
/// event history and a full inventory.
#[must_use]
pub fn session_with_memories(memories: usize) -> SessionState {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_else(Utc::now);
    let mut session = SessionState::new("Bench", "Lavender Town");
    session.story.content = "Fog rolls over the tower. ".repeat(30);
    for i in 0..memories {
        let kind = match i % 10 {
            0 => MemoryKind::Promise,
            1 | 2 => MemoryKind::Relationship,
            3 => MemoryKind::Achievement,
            4 => MemoryKind::Lesson,
            _ => MemoryKind::General,
        };
        let minute = i64::try_from(i).unwrap_or(i64::MAX / 60);
        session.memories.push(MemoryRecord::at(
            kind,
            format!("Memory {i}: something worth remembering happened near the tower"),
            base + Duration::minutes(minute),
        ));
    }
    session.progression.completed_events = (0..200).map(|i| format!("Event {i}")).collect();
    session.progression.inventory = (0..40).map(|i| format!("Item {i:02}")).collect();
    session.choices = (0..4).map(|i| ChoiceOption::new(format!("Option {i}")).with_effect("courage", 1)).collect();
    session
}
