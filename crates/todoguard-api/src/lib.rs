//! todoguard API - REST server
//!
//! HTTP endpoints for signup/login sessions and per-user todos, wrapped in a
//! request sanitizer and a route-table driven access guard.

pub mod audit;
pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use routes::{create_router, ApiDoc};
pub use state::AppState;
