//! Service helpers that expose read-only public projections of the session.

use crate::{
    dto::public::{
        BoardResponse, LogEntryDto, LogResponse, MediaStateResponse, SessionStateResponse,
    },
    state::SharedState,
};

/// Full session snapshot as shown to displays.
pub async fn get_session_state(state: &SharedState) -> SessionStateResponse {
    state.read(|session| SessionStateResponse::from(session)).await
}

/// Categories and questions, without answers.
pub async fn get_board(state: &SharedState) -> BoardResponse {
    state.read(|session| BoardResponse::from(session)).await
}

/// What the display should currently be playing.
pub async fn get_media_state(state: &SharedState) -> MediaStateResponse {
    state.read(|session| MediaStateResponse::from(session)).await
}

/// Audit log entries starting at `since`.
pub async fn get_log(state: &SharedState, since: u64) -> LogResponse {
    state
        .read(|session| {
            let log = session.log();
            LogResponse {
                entries: log.since(since).iter().map(LogEntryDto::from).collect(),
                next: log.len() as u64,
            }
        })
        .await
}
