use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dto::public::{
        BoardResponse, LogQuery, LogResponse, MediaStateResponse, SessionStateResponse,
    },
    services::public_service,
    state::SharedState,
};

/// Public read-only endpoints that expose the current session.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/public/state", get(get_session_state))
        .route("/public/board", get(get_board))
        .route("/public/media", get(get_media_state))
        .route("/public/log", get(get_log))
}

#[utoipa::path(
    get,
    path = "/public/state",
    tag = "public",
    responses((status = 200, description = "Current session state", body = SessionStateResponse))
)]
/// Return phase, players, scores and the active question.
pub async fn get_session_state(State(state): State<SharedState>) -> Json<SessionStateResponse> {
    Json(public_service::get_session_state(&state).await)
}

#[utoipa::path(
    get,
    path = "/public/board",
    tag = "public",
    responses((status = 200, description = "Categories and questions", body = BoardResponse))
)]
pub async fn get_board(State(state): State<SharedState>) -> Json<BoardResponse> {
    Json(public_service::get_board(&state).await)
}

#[utoipa::path(
    get,
    path = "/public/media",
    tag = "public",
    responses((status = 200, description = "Media playback state", body = MediaStateResponse))
)]
/// Return what the display should be playing for the active question.
pub async fn get_media_state(State(state): State<SharedState>) -> Json<MediaStateResponse> {
    Json(public_service::get_media_state(&state).await)
}

#[utoipa::path(
    get,
    path = "/public/log",
    tag = "public",
    params(LogQuery),
    responses((status = 200, description = "Audit log page", body = LogResponse))
)]
/// Return audit log entries from `since` onwards.
pub async fn get_log(
    State(state): State<SharedState>,
    Query(query): Query<LogQuery>,
) -> Json<LogResponse> {
    Json(public_service::get_log(&state, query.since).await)
}
