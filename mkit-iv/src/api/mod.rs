//! HTTP API handlers for mkit-iv
//!
//! Operator-facing REST + SSE surface over the intake pipeline

pub mod commit;
pub mod health;
pub mod intake;
pub mod photos;
pub mod review;
pub mod sse;

pub use commit::commit_routes;
pub use health::health_routes;
pub use intake::intake_routes;
pub use photos::photo_routes;
pub use review::review_routes;
pub use sse::event_stream;
