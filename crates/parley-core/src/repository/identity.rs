//! IdentityRepository trait definition.

use parley_types::error::RepositoryError;
use parley_types::identity::Identity;

/// Repository trait for identity persistence.
///
/// Implementations live in parley-infra (e.g., `SqliteIdentityRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait IdentityRepository: Send + Sync {
    /// Insert a new identity.
    ///
    /// Returns `RepositoryError::Conflict` when the username is already taken.
    fn create(
        &self,
        identity: &Identity,
    ) -> impl std::future::Future<Output = Result<Identity, RepositoryError>> + Send;

    /// Look up an identity by its exact username.
    fn find_by_username(
        &self,
        username: &str,
    ) -> impl std::future::Future<Output = Result<Option<Identity>, RepositoryError>> + Send;
}
