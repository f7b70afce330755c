//! HTTP surface of the studio.

pub mod api;
pub mod client;
pub mod page;
pub mod server;

pub use api::{AppState, SharedState, api_router};
pub use server::{build_router, default_pipeline, start_server};
