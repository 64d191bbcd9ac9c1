//! Business logic behind the host REST routes. Every mutation goes through
//! [`AppState::arbitrate`](crate::state::AppState::arbitrate).

use tokio::time::Instant;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::SnapshotEntity,
    dto::{
        format_system_time,
        host::{
            ActionResponse, AnswerResponseRequest, BindRequest, BindResponse,
            CompletionOverrideRequest, QuestionRequest, ScoreAdjustmentRequest,
            ScoreUpdateResponse, SnapshotListItem, SnapshotSavedResponse,
        },
    },
    error::ServiceError,
    state::{
        SharedState,
        session::{GameError, GameSession, SessionSnapshot},
        state_machine::GamePhase,
    },
};

async fn command(
    state: &SharedState,
    op: impl FnOnce(&mut GameSession) -> Result<GamePhase, GameError>,
) -> Result<ActionResponse, ServiceError> {
    let phase = state.arbitrate(op).await?;
    Ok(ActionResponse { phase })
}

/// Record the intent to bind the next buzzer press.
pub async fn register_bind(
    state: &SharedState,
    request: BindRequest,
) -> Result<BindResponse, ServiceError> {
    let token = state
        .arbitrate(|session| session.register_bind(&request.name, &request.colour))
        .await?;
    Ok(BindResponse { token: token.0 })
}

/// Log a host request refused before it could be turned into a command.
pub async fn record_refused_request(state: &SharedState, command: &str, reason: &str) {
    state
        .arbitrate(|session| session.record_rejection(command, reason))
        .await;
}

pub async fn start_demo(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    let now = Instant::now();
    command(state, |session| session.start_demo(now)).await
}

pub async fn stop_demo(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    command(state, GameSession::stop_demo).await
}

pub async fn start_game(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    command(state, GameSession::start_game).await
}

/// Open a question, or close the active one when a question is already on screen.
pub async fn select_question(
    state: &SharedState,
    request: QuestionRequest,
) -> Result<ActionResponse, ServiceError> {
    command(state, |session| {
        session.select_question(&request.category, &request.question)
    })
    .await
}

pub async fn unselect_current(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    command(state, GameSession::unselect_current).await
}

pub async fn activate_buzzers(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    let now = Instant::now();
    command(state, |session| session.activate_buzzers(now)).await
}

pub async fn show_answer(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    command(state, GameSession::show_answer).await
}

pub async fn answer_response(
    state: &SharedState,
    request: AnswerResponseRequest,
) -> Result<ActionResponse, ServiceError> {
    command(state, |session| session.answer_response(request.correct)).await
}

pub async fn override_completion(
    state: &SharedState,
    request: CompletionOverrideRequest,
) -> Result<ActionResponse, ServiceError> {
    command(state, |session| {
        session.override_completion(&request.category, &request.question, request.complete)
    })
    .await
}

pub async fn adjust_score(
    state: &SharedState,
    slot: u8,
    request: ScoreAdjustmentRequest,
) -> Result<ScoreUpdateResponse, ServiceError> {
    let score = state
        .arbitrate(|session| session.adjust_score(slot, request.delta))
        .await?;
    Ok(ScoreUpdateResponse { slot, score })
}

pub async fn finish_game(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    command(state, GameSession::finish_game).await
}

pub async fn start_tiebreak(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    command(state, GameSession::start_tiebreak).await
}

/// Serializable image of the running session.
pub async fn export_snapshot(state: &SharedState) -> SessionSnapshot {
    state.read(GameSession::snapshot).await
}

/// Replace the running session with a snapshot supplied by the caller.
pub async fn import_snapshot(
    state: &SharedState,
    snapshot: SessionSnapshot,
) -> Result<ActionResponse, ServiceError> {
    command(state, |session| session.restore(snapshot)).await
}

/// Persist the running session in the snapshot store.
pub async fn save_snapshot(state: &SharedState) -> Result<SnapshotSavedResponse, ServiceError> {
    let entity = SnapshotEntity::capture(export_snapshot(state).await);
    let response = SnapshotSavedResponse {
        id: entity.id,
        saved_at: format_system_time(entity.saved_at),
    };
    state.snapshots().save(entity).await?;
    info!(id = %response.id, "session snapshot saved");
    Ok(response)
}

pub async fn list_snapshots(state: &SharedState) -> Result<Vec<SnapshotListItem>, ServiceError> {
    let items = state.snapshots().list().await?;
    Ok(items.into_iter().map(Into::into).collect())
}

/// Restore a stored snapshot.
pub async fn load_snapshot(state: &SharedState, id: Uuid) -> Result<ActionResponse, ServiceError> {
    let entity = state
        .snapshots()
        .find(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("snapshot `{id}` not found")))?;
    import_snapshot(state, entity.session).await
}

pub async fn delete_snapshot(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    if state.snapshots().delete(id).await? {
        Ok(())
    } else {
        Err(ServiceError::NotFound(format!("snapshot `{id}` not found")))
    }
}
