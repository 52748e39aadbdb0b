//! CredentialHasher trait definition.
//!
//! Password hashing is CPU-bound and lives behind a trait so core never
//! depends on a specific KDF. The Argon2 implementation is in parley-infra.

use parley_types::error::IdentityError;

/// Derives and checks password hashes.
pub trait CredentialHasher: Send + Sync {
    /// Hash a plaintext password into a self-describing string (PHC format).
    fn hash(&self, password: &str) -> Result<String, IdentityError>;

    /// Check a plaintext password against a stored hash.
    ///
    /// A malformed stored hash verifies as `false`.
    fn verify(&self, password: &str, stored_hash: &str) -> bool;
}
