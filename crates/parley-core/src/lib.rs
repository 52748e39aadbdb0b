//! Business logic and repository trait definitions for Parley.
//!
//! This crate defines the "ports" (repository and provider traits) that the
//! infrastructure layer implements, plus the session, rate-limit, ownership
//! and conversation logic built on top of them. It depends only on
//! `parley-types` -- never on `parley-infra` or any database/HTTP crate.

pub mod auth;
pub mod chat;
pub mod identity;
pub mod llm;
pub mod ratelimit;
pub mod repository;

#[cfg(test)]
pub(crate) mod testing;
