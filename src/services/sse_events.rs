use crate::{
    dto::public::{LogEntryDto, SessionStateResponse},
    state::{SharedState, event_log::LogEntry, session::GameSession},
};

const EVENT_LOG_ENTRY: &str = "log.entry";
const EVENT_SESSION_STATE: &str = "session.state";

/// Publish fresh log entries followed by the resulting session state.
pub fn broadcast_session_update(state: &SharedState, session: &GameSession, entries: &[LogEntry]) {
    for entry in entries {
        let payload = LogEntryDto::from(entry);
        state.public_events().publish(EVENT_LOG_ENTRY, &payload);
        state.host_events().publish(EVENT_LOG_ENTRY, &payload);
    }

    let snapshot = SessionStateResponse::from(session);
    state.public_events().publish(EVENT_SESSION_STATE, &snapshot);
    state.host_events().publish(EVENT_SESSION_STATE, &snapshot);
}
