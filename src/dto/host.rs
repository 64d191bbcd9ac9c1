//! DTO definitions used by the host REST API and documentation layer.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::SnapshotListItemEntity,
    dto::{format_system_time, validation::validate_colour},
    state::{players::MAX_NAME_LENGTH, state_machine::GamePhase},
};

/// Upper bound of a player name for `validator`, which counts in `u64`.
const NAME_LENGTH_MAX: u64 = MAX_NAME_LENGTH as u64;

/// Intent to bind the next buzzer that reports a bind press.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct BindRequest {
    #[validate(length(min = 1, max = NAME_LENGTH_MAX))]
    pub name: String,
    /// `#rrggbb` indicator colour.
    #[validate(custom(function = "validate_colour"))]
    pub colour: String,
}

/// Token identifying the recorded bind intent.
#[derive(Debug, Serialize, ToSchema)]
pub struct BindResponse {
    pub token: u64,
}

/// Reference to a question by category title and prompt.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct QuestionRequest {
    #[validate(length(min = 1))]
    pub category: String,
    #[validate(length(min = 1))]
    pub question: String,
}

/// Verdict on the buzzed player's answer.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AnswerResponseRequest {
    pub correct: bool,
}

/// Force the completion flag of a question.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CompletionOverrideRequest {
    #[validate(length(min = 1))]
    pub category: String,
    #[validate(length(min = 1))]
    pub question: String,
    pub complete: bool,
}

/// Manual score correction.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ScoreAdjustmentRequest {
    pub delta: i32,
}

/// Result of a score adjustment, returning the updated tally.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScoreUpdateResponse {
    pub slot: u8,
    pub score: i32,
}

/// Acknowledgement returned by every phase command.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub phase: GamePhase,
}

/// Confirmation of a stored snapshot.
#[derive(Debug, Serialize, ToSchema)]
pub struct SnapshotSavedResponse {
    pub id: Uuid,
    pub saved_at: String,
}

/// Stored snapshot as listed for the host.
#[derive(Debug, Serialize, ToSchema)]
pub struct SnapshotListItem {
    pub id: Uuid,
    pub saved_at: String,
    pub phase: GamePhase,
    pub players: usize,
    pub remaining_questions: usize,
}

impl From<SnapshotListItemEntity> for SnapshotListItem {
    fn from(entity: SnapshotListItemEntity) -> Self {
        Self {
            id: entity.id,
            saved_at: format_system_time(entity.saved_at),
            phase: entity.phase,
            players: entity.players,
            remaining_questions: entity.remaining_questions,
        }
    }
}
