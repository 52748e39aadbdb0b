//! Authentication primitives: session tokens and credential hashing.

pub mod credentials;
pub mod session;
