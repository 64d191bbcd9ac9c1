use axum::{
    Json, Router,
    body::Body,
    extract::{FromRequest, Path, State, rejection::JsonRejection},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
};
use axum_valid::{Valid, ValidRejection};
use serde::de::DeserializeOwned;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::host::{
        ActionResponse, AnswerResponseRequest, BindRequest, BindResponse,
        CompletionOverrideRequest, QuestionRequest, ScoreAdjustmentRequest, ScoreUpdateResponse,
        SnapshotListItem, SnapshotSavedResponse,
    },
    error::AppError,
    services::{host_service, sse_service},
    state::{SharedState, session::SessionSnapshot},
};

const HOST_TOKEN_HEADER: &str = "x-host-token";

/// Host-only endpoints driving the show.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/host/players/bind", post(register_bind))
        .route("/host/players/{slot}/score", post(adjust_score))
        .route("/host/demo/start", post(start_demo))
        .route("/host/demo/stop", post(stop_demo))
        .route("/host/game/start", post(start_game))
        .route("/host/game/finish", post(finish_game))
        .route("/host/game/tiebreak", post(start_tiebreak))
        .route("/host/question/select", post(select_question))
        .route("/host/question/unselect", post(unselect_current))
        .route("/host/questions/completion", post(override_completion))
        .route("/host/buzzers/activate", post(activate_buzzers))
        .route("/host/answer/show", post(show_answer))
        .route("/host/answer/respond", post(answer_response))
        .route(
            "/host/session/snapshot",
            get(export_snapshot).post(import_snapshot),
        )
        .route("/host/snapshots", get(list_snapshots).post(save_snapshot))
        .route("/host/snapshots/{id}", delete(delete_snapshot))
        .route("/host/snapshots/{id}/load", post(load_snapshot))
        .route_layer(middleware::from_fn_with_state(state, require_host_token))
}

/// Record the name and colour to give the next buzzer that reports a bind press.
#[utoipa::path(
    post,
    path = "/host/players/bind",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host token issued by the /sse/host stream")),
    request_body = BindRequest,
    responses(
        (status = 200, description = "Bind intent recorded", body = BindResponse),
        (status = 400, description = "Invalid name or colour")
    )
)]
pub async fn register_bind(
    State(state): State<SharedState>,
    HostJson(payload): HostJson<BindRequest>,
) -> Result<Json<BindResponse>, AppError> {
    Ok(Json(host_service::register_bind(&state, payload).await?))
}

/// Apply a manual score correction to the player at `slot`.
#[utoipa::path(
    post,
    path = "/host/players/{slot}/score",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host token issued by the /sse/host stream"),
    ("slot" = u8, Path, description = "Buzzer slot of the player")),
    request_body = ScoreAdjustmentRequest,
    responses(
        (status = 200, description = "Score updated", body = ScoreUpdateResponse),
        (status = 404, description = "No player bound to the slot")
    )
)]
pub async fn adjust_score(
    State(state): State<SharedState>,
    Path(slot): Path<u8>,
    HostJson(payload): HostJson<ScoreAdjustmentRequest>,
) -> Result<Json<ScoreUpdateResponse>, AppError> {
    Ok(Json(host_service::adjust_score(&state, slot, payload).await?))
}

/// Arm the buzzers for a test round.
#[utoipa::path(
    post,
    path = "/host/demo/start",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host token issued by the /sse/host stream")),
    responses(
        (status = 200, description = "Demo started", body = ActionResponse),
        (status = 409, description = "Not in setup")
    )
)]
pub async fn start_demo(State(state): State<SharedState>) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(host_service::start_demo(&state).await?))
}

#[utoipa::path(
    post,
    path = "/host/demo/stop",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host token issued by the /sse/host stream")),
    responses(
        (status = 200, description = "Back to setup", body = ActionResponse),
        (status = 409, description = "Not in demo")
    )
)]
pub async fn stop_demo(State(state): State<SharedState>) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(host_service::stop_demo(&state).await?))
}

/// Start, or restart, the game on the selection board.
#[utoipa::path(
    post,
    path = "/host/game/start",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host token issued by the /sse/host stream")),
    responses((status = 200, description = "Game started", body = ActionResponse))
)]
pub async fn start_game(State(state): State<SharedState>) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(host_service::start_game(&state).await?))
}

#[utoipa::path(
    post,
    path = "/host/game/finish",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host token issued by the /sse/host stream")),
    responses(
        (status = 200, description = "Game over", body = ActionResponse),
        (status = 409, description = "Not on the selection board")
    )
)]
pub async fn finish_game(State(state): State<SharedState>) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(host_service::finish_game(&state).await?))
}

#[utoipa::path(
    post,
    path = "/host/game/tiebreak",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host token issued by the /sse/host stream")),
    responses(
        (status = 200, description = "Tiebreak round opened", body = ActionResponse),
        (status = 409, description = "Not on the selection board or game over")
    )
)]
pub async fn start_tiebreak(
    State(state): State<SharedState>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(host_service::start_tiebreak(&state).await?))
}

/// Open a question. When a question is already active, close it instead.
#[utoipa::path(
    post,
    path = "/host/question/select",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host token issued by the /sse/host stream")),
    request_body = QuestionRequest,
    responses(
        (status = 200, description = "Question opened or closed", body = ActionResponse),
        (status = 400, description = "Ambiguous title"),
        (status = 404, description = "Unknown category or question"),
        (status = 409, description = "Not allowed in the current phase")
    )
)]
pub async fn select_question(
    State(state): State<SharedState>,
    HostJson(payload): HostJson<QuestionRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(host_service::select_question(&state, payload).await?))
}

#[utoipa::path(
    post,
    path = "/host/question/unselect",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host token issued by the /sse/host stream")),
    responses(
        (status = 200, description = "Question closed and marked complete", body = ActionResponse),
        (status = 409, description = "No active question")
    )
)]
pub async fn unselect_current(
    State(state): State<SharedState>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(host_service::unselect_current(&state).await?))
}

/// Force the completion flag of any question without changing the phase.
#[utoipa::path(
    post,
    path = "/host/questions/completion",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host token issued by the /sse/host stream")),
    request_body = CompletionOverrideRequest,
    responses(
        (status = 200, description = "Completion flag set", body = ActionResponse),
        (status = 404, description = "Unknown category or question")
    )
)]
pub async fn override_completion(
    State(state): State<SharedState>,
    HostJson(payload): HostJson<CompletionOverrideRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(host_service::override_completion(&state, payload).await?))
}

#[utoipa::path(
    post,
    path = "/host/buzzers/activate",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host token issued by the /sse/host stream")),
    responses(
        (status = 200, description = "Buzzers armed", body = ActionResponse),
        (status = 409, description = "Not waiting or answered")
    )
)]
pub async fn activate_buzzers(
    State(state): State<SharedState>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(host_service::activate_buzzers(&state).await?))
}

#[utoipa::path(
    post,
    path = "/host/answer/show",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host token issued by the /sse/host stream")),
    responses(
        (status = 200, description = "Answer revealed", body = ActionResponse),
        (status = 409, description = "Nobody has buzzed")
    )
)]
pub async fn show_answer(State(state): State<SharedState>) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(host_service::show_answer(&state).await?))
}

/// Score the buzzed player's answer.
#[utoipa::path(
    post,
    path = "/host/answer/respond",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host token issued by the /sse/host stream")),
    request_body = AnswerResponseRequest,
    responses(
        (status = 200, description = "Answer scored", body = ActionResponse),
        (status = 409, description = "No player is answering")
    )
)]
pub async fn answer_response(
    State(state): State<SharedState>,
    HostJson(payload): HostJson<AnswerResponseRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(host_service::answer_response(&state, payload).await?))
}

#[utoipa::path(
    get,
    path = "/host/session/snapshot",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host token issued by the /sse/host stream")),
    responses((status = 200, description = "Serialized session", body = SessionSnapshot))
)]
/// Export the whole session as a JSON document.
pub async fn export_snapshot(State(state): State<SharedState>) -> Json<SessionSnapshot> {
    Json(host_service::export_snapshot(&state).await)
}

#[utoipa::path(
    post,
    path = "/host/session/snapshot",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host token issued by the /sse/host stream")),
    request_body = SessionSnapshot,
    responses(
        (status = 200, description = "Session replaced", body = ActionResponse),
        (status = 400, description = "Snapshot violates session invariants")
    )
)]
/// Replace the session with an exported document.
pub async fn import_snapshot(
    State(state): State<SharedState>,
    HostJson(snapshot): HostJson<SessionSnapshot>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(host_service::import_snapshot(&state, snapshot).await?))
}

#[utoipa::path(
    post,
    path = "/host/snapshots",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host token issued by the /sse/host stream")),
    responses(
        (status = 200, description = "Snapshot stored", body = SnapshotSavedResponse),
        (status = 503, description = "Snapshot store unavailable")
    )
)]
pub async fn save_snapshot(
    State(state): State<SharedState>,
) -> Result<Json<SnapshotSavedResponse>, AppError> {
    Ok(Json(host_service::save_snapshot(&state).await?))
}

#[utoipa::path(
    get,
    path = "/host/snapshots",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host token issued by the /sse/host stream")),
    responses((status = 200, description = "Stored snapshots, newest first", body = [SnapshotListItem]))
)]
pub async fn list_snapshots(
    State(state): State<SharedState>,
) -> Result<Json<Vec<SnapshotListItem>>, AppError> {
    Ok(Json(host_service::list_snapshots(&state).await?))
}

#[utoipa::path(
    post,
    path = "/host/snapshots/{id}/load",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host token issued by the /sse/host stream"),
    ("id" = String, Path, description = "Identifier of the stored session")),
    responses(
        (status = 200, description = "Session restored", body = ActionResponse),
        (status = 404, description = "Unknown snapshot")
    )
)]
/// Restore a stored snapshot, re-issuing indicator colours to the control board.
pub async fn load_snapshot(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(host_service::load_snapshot(&state, id).await?))
}

#[utoipa::path(
    delete,
    path = "/host/snapshots/{id}",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host token issued by the /sse/host stream"),
    ("id" = String, Path, description = "Identifier of the stored session")),
    responses(
        (status = 204, description = "Snapshot deleted"),
        (status = 404, description = "Unknown snapshot")
    )
)]
pub async fn delete_snapshot(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    host_service::delete_snapshot(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// JSON body checked with `validator`. Refused bodies are logged in the session like any
/// other rejected host command.
pub struct HostJson<T>(pub T);

impl<T> FromRequest<SharedState> for HostJson<T>
where
    T: DeserializeOwned + Validate + Send,
{
    type Rejection = AppError;

    async fn from_request(req: Request<Body>, state: &SharedState) -> Result<Self, Self::Rejection> {
        let command = req.uri().path().to_owned();
        match Valid::<Json<T>>::from_request(req, state).await {
            Ok(Valid(Json(payload))) => Ok(Self(payload)),
            Err(rejection) => {
                let reason = refusal_reason(rejection);
                host_service::record_refused_request(state, &command, &reason).await;
                Err(AppError::BadRequest(reason))
            }
        }
    }
}

fn refusal_reason(rejection: ValidRejection<JsonRejection>) -> String {
    match rejection {
        ValidRejection::Valid(errors) => format!("validation failed: {errors}"),
        ValidRejection::Inner(inner) => inner.body_text(),
    }
}

async fn require_host_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(HOST_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    sse_service::verify_host_token(&state, provided.as_deref()).await?;
    Ok(next.run(req).await)
}
