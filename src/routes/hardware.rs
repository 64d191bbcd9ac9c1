use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{services::hardware_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/hardware",
    tag = "hardware",
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Upgrade the HTTP connection into a control board session.
pub async fn hardware_handler(
    State(state): State<SharedState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| hardware_service::handle_socket(state, socket))
}

/// Configure the hardware link endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/hardware", get(hardware_handler))
}
