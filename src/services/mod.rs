/// Board loading from the content loader's output.
pub mod content_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Control board WebSocket handling.
pub mod hardware_service;
/// Health check service.
pub mod health_service;
/// Host commands driving the session.
pub mod host_service;
/// Public service for read-only session views.
pub mod public_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
