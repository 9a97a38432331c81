//! HTTP API: session endpoints, permission checks and their middleware.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;
