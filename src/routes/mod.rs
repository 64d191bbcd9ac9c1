use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod hardware;
pub mod health;
pub mod host;
pub mod public;
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(hardware::router())
        .merge(public::router())
        .merge(host::router(state.clone()));

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
