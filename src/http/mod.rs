//! HTTP surface: router, health endpoint, auth token verification

pub mod auth;
pub mod routes;

pub use routes::build_router;
