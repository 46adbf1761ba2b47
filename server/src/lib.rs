//! HTTP surface for the Planbook embedding engine.
//!
//! Thin request validation and dispatch over [`planbook_search`]; all
//! embedding behavior lives in the engine.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
