use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

const OPENAPI_PATH: &str = "/api-doc/openapi.json";

/// Serve the Swagger UI and the raw OpenAPI document for the quiz API.
pub fn router(state: SharedState) -> Router<SharedState> {
    let mut doc = ApiDoc::openapi();
    doc.info.title = "Quiz Buzz Back".into();
    doc.info.description = Some(
        "Game session state machine and buzzer arbitration for a trivia game show.".into(),
    );

    let ui: Router<SharedState> = SwaggerUi::new("/docs").url(OPENAPI_PATH, doc).into();
    ui.with_state(state)
}
