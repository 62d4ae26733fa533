//! adg-daemon library target.
//!
//! Exposes the router, state and limiter for integration tests.
//! The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod limits;
pub mod routes;
pub mod state;
