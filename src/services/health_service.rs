use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report service health, flagging a missing control board.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let connections = state.hardware().connected();
    if connections == 0 {
        warn!("no control board connected");
    }
    HealthResponse::from_connections(connections)
}
