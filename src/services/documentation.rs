use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI document for Quiz Buzz Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::public_stream,
        crate::routes::sse::host_stream,
        crate::routes::hardware::hardware_handler,
        crate::routes::public::get_session_state,
        crate::routes::public::get_board,
        crate::routes::public::get_media_state,
        crate::routes::public::get_log,
        crate::routes::host::register_bind,
        crate::routes::host::adjust_score,
        crate::routes::host::start_demo,
        crate::routes::host::stop_demo,
        crate::routes::host::start_game,
        crate::routes::host::finish_game,
        crate::routes::host::start_tiebreak,
        crate::routes::host::select_question,
        crate::routes::host::unselect_current,
        crate::routes::host::override_completion,
        crate::routes::host::activate_buzzers,
        crate::routes::host::show_answer,
        crate::routes::host::answer_response,
        crate::routes::host::export_snapshot,
        crate::routes::host::import_snapshot,
        crate::routes::host::save_snapshot,
        crate::routes::host::list_snapshots,
        crate::routes::host::load_snapshot,
        crate::routes::host::delete_snapshot,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::sse::HostHandshake,
            crate::dto::public::SessionStateResponse,
            crate::dto::public::BoardResponse,
            crate::dto::public::MediaStateResponse,
            crate::dto::public::LogResponse,
            crate::dto::public::LogEntryDto,
            crate::dto::host::BindRequest,
            crate::dto::host::BindResponse,
            crate::dto::host::ActionResponse,
            crate::state::session::SessionSnapshot,
            crate::state::event_log::LogKind,
            crate::state::state_machine::GamePhase,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "hardware", description = "WebSocket link to the buzzer control board"),
        (name = "public", description = "Read-only session views for displays"),
        (name = "host", description = "Commands reserved to the host"),
    )
)]
pub struct ApiDoc;
