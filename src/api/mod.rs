//! HTTP surface: health, stats, metrics and the identity registry

pub mod handlers;
pub mod routes;
pub mod server;
pub mod types;

pub use handlers::AppState;
pub use routes::api_routes;
pub use server::serve_api;
