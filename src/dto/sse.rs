use serde::Serialize;
use utoipa::ToSchema;

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Raw text event.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// First event on the host stream, carrying the token for `X-Host-Token`.
pub struct HostHandshake {
    pub token: String,
}

impl From<ServerEvent> for axum::response::sse::Event {
    fn from(message: ServerEvent) -> Self {
        let event = Self::default().data(message.data);
        match message.event {
            Some(name) => event.event(name),
            None => event,
        }
    }
}
