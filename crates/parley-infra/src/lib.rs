//! Infrastructure layer for Parley.
//!
//! Contains implementations of the traits defined in `parley-core`: SQLite
//! repositories, Argon2id credential hashing, the OpenAI-compatible completion
//! provider, and configuration loading.

pub mod config;
pub mod crypto;
pub mod llm;
pub mod sqlite;
