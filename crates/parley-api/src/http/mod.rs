//! HTTP layer for Parley.
//!
//! Axum router with a session-cookie gateway in front of the auth,
//! conversation and chat handlers.

pub mod error;
pub mod gateway;
pub mod handlers;
pub mod router;
