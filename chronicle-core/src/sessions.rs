//! Active session table.
//!
//! Live sessions keyed by player, passed by reference to whatever handles
//! requests. Each entry sits behind its own mutex, so mutations of one
//! player's session are serialised while different players proceed in
//! parallel. The map lock is only held long enough to clone the entry
//! handle; callbacks never run under it.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{ChronicleError, Resource, Result};
use crate::session::SessionState;
use crate::types::PlayerId;

/// Live sessions by player id.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: DashMap<PlayerId, Arc<Mutex<SessionState>>>,
}

impl SessionTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a session, replacing any previous one for the same player.
    pub fn insert(&self, session: SessionState) -> PlayerId {
        let id = session.player_id();
        self.sessions.insert(id, Arc::new(Mutex::new(session)));
        debug!(player = %id, "Session installed");
        id
    }

    fn entry(&self, player: PlayerId) -> Result<Arc<Mutex<SessionState>>> {
        self.sessions
            .get(&player)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| ChronicleError::not_found(Resource::Session, player))
    }

    /// Run `f` against a player's session.
    ///
    /// # Errors
    ///
    /// [`ChronicleError::NotFound`] if the player has no live session.
    pub fn with_session<R>(&self, player: PlayerId, f: impl FnOnce(&SessionState) -> R) -> Result<R> {
        let entry = self.entry(player)?;
        let guard = entry.lock();
        Ok(f(&*guard))
    }

    /// Run `f` with exclusive access to a player's session.
    ///
    /// # Errors
    ///
    /// [`ChronicleError::NotFound`] if the player has no live session.
    pub fn with_session_mut<R>(&self, player: PlayerId, f: impl FnOnce(&mut SessionState) -> R) -> Result<R> {
        let entry = self.entry(player)?;
        let mut guard = entry.lock();
        Ok(f(&mut *guard))
    }

    /// Take a player's session out of the table.
    ///
    /// # Errors
    ///
    /// [`ChronicleError::NotFound`] if the player has no live session.
    pub fn remove(&self, player: PlayerId) -> Result<SessionState> {
        let (_, entry) = self
            .sessions
            .remove(&player)
            .ok_or_else(|| ChronicleError::not_found(Resource::Session, player))?;
        debug!(player = %player, "Session removed");
        Ok(Arc::try_unwrap(entry).map_or_else(|shared| shared.lock().clone(), Mutex::into_inner))
    }

    /// Whether a player has a live session.
    #[must_use]
    pub fn contains(&self, player: PlayerId) -> bool {
        self.sessions.contains_key(&player)
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MemoryKind;

    #[test]
    fn insert_read_mutate_remove() {
        let table = SessionTable::new();
        let id = table.insert(SessionState::new("Ash", "Pallet Town"));
        assert_eq!(table.len(), 1);

        table
            .with_session_mut(id, |s| {
                s.record_memory(MemoryKind::Promise, "Deliver the parcel");
            })
            .expect("live session");
        let count = table.with_session(id, |s| s.memories.len()).expect("live session");
        assert_eq!(count, 1);

        let session = table.remove(id).expect("remove");
        assert_eq!(session.player.name, "Ash");
        assert!(table.is_empty());
    }

    #[test]
    fn unknown_player_is_not_found() {
        let table = SessionTable::new();
        let ghost = PlayerId::new();
        assert!(table.with_session(ghost, |_| ()).expect_err("missing").is_not_found());
        assert!(table.with_session_mut(ghost, |_| ()).expect_err("missing").is_not_found());
        assert!(table.remove(ghost).expect_err("missing").is_not_found());
        assert!(!table.contains(ghost));
    }

    #[test]
    fn concurrent_mutations_are_serialised() {
        let table = SessionTable::new();
        let id = table.insert(SessionState::new("Ash", "Pallet Town"));
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        table
                            .with_session_mut(id, |s| {
                                s.record_memory(MemoryKind::General, "step");
                            })
                            .expect("live session");
                    }
                });
            }
        });
        assert_eq!(table.with_session(id, |s| s.memories.len()).expect("live"), 400);
    }
}
