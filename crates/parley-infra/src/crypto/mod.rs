//! Cryptographic operations for Parley.
//!
//! - `password`: Argon2id password hashing for identity credentials

pub mod password;
