use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::state::{session::SessionSnapshot, state_machine::GamePhase};

/// Persisted session document, keyed by the session identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotEntity {
    /// Identifier of the session the snapshot was taken from.
    pub id: Uuid,
    /// When the snapshot was written.
    pub saved_at: SystemTime,
    /// Full session state.
    pub session: SessionSnapshot,
}

impl SnapshotEntity {
    /// Wrap a session snapshot, stamping it with the current time.
    pub fn capture(session: SessionSnapshot) -> Self {
        Self {
            id: session.id,
            saved_at: SystemTime::now(),
            session,
        }
    }
}

/// Lightweight listing entry for stored snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotListItemEntity {
    pub id: Uuid,
    pub saved_at: SystemTime,
    pub phase: GamePhase,
    pub players: usize,
    /// Questions not yet played at save time.
    pub remaining_questions: usize,
}

impl From<&SnapshotEntity> for SnapshotListItemEntity {
    fn from(entity: &SnapshotEntity) -> Self {
        Self {
            id: entity.id,
            saved_at: entity.saved_at,
            phase: entity.session.phase,
            players: entity.session.players.len(),
            remaining_questions: entity.session.board.remaining(),
        }
    }
}
