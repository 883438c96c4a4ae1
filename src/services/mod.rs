/// OpenAPI documentation generation.
pub mod documentation;
/// Game operations exposed over HTTP.
pub mod game_service;
/// Closing of idle open games.
pub mod game_sweeper;
/// Health check service.
pub mod health_service;
/// Server-Sent Events streaming of game views.
pub mod sse_service;
/// Storage backend selection and health supervision.
pub mod storage_supervisor;
