//! HTTP API Layer
//!
//! axum surface for the Mediapress job service: upload intake, per-session job queries,
//! downloads, thumbnails and health. Sessions are carried in the `session_id` cookie.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod session;
pub mod state;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use router::create_router;
pub use server::{BoundServer, HttpServer, HttpServerConfig};
pub use state::ApiState;
