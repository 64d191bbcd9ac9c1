use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded" while no control board is connected).
    pub status: String,
    /// Number of control boards attached to the hardware link.
    pub hardware_connections: usize,
}

impl HealthResponse {
    /// Build the response from the number of attached control boards.
    pub fn from_connections(hardware_connections: usize) -> Self {
        let status = if hardware_connections > 0 { "ok" } else { "degraded" };
        Self {
            status: status.to_string(),
            hardware_connections,
        }
    }
}
