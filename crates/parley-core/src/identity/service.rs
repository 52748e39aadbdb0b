//! Identity service: registration and credential checks.
//!
//! Password hashing runs on the blocking pool; a KDF tuned for passwords takes
//! long enough to stall an async worker. A login for an unknown username is
//! verified against a decoy hash so it costs the same as a wrong password.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use parley_types::error::{IdentityError, RepositoryError};
use parley_types::identity::{Credentials, Identity, IdentityId};

use crate::auth::credentials::CredentialHasher;
use crate::repository::identity::IdentityRepository;

const MAX_USERNAME_CHARS: usize = 64;
const MAX_PASSWORD_BYTES: usize = 1024;

/// Hashed once at startup; no login can match it.
const DECOY_PASSWORD: &str = "parley-decoy-credential";

/// Service for creating identities and authenticating them.
///
/// Generic over repository and hasher traits -- parley-core never depends on
/// parley-infra.
pub struct IdentityService<R: IdentityRepository, H: CredentialHasher + 'static> {
    repo: R,
    hasher: Arc<H>,
    decoy_hash: Arc<str>,
}

impl<R: IdentityRepository, H: CredentialHasher + 'static> IdentityService<R, H> {
    /// Fails only if the hasher cannot produce the decoy hash.
    pub fn new(repo: R, hasher: H) -> Result<Self, IdentityError> {
        let decoy_hash = hasher.hash(DECOY_PASSWORD)?;
        Ok(Self {
            repo,
            hasher: Arc::new(hasher),
            decoy_hash: decoy_hash.into(),
        })
    }

    /// Create a new identity.
    ///
    /// Fails with `Conflict` when the username is taken, including when a
    /// concurrent registration wins the unique index.
    pub async fn register(&self, credentials: &Credentials) -> Result<Identity, IdentityError> {
        validate(credentials)?;

        if self
            .repo
            .find_by_username(&credentials.username)
            .await?
            .is_some()
        {
            return Err(IdentityError::Conflict);
        }

        let hasher = self.hasher.clone();
        let password = credentials.password.clone();
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| IdentityError::Hashing(e.to_string()))??;

        let identity = Identity {
            id: IdentityId::new(),
            username: credentials.username.clone(),
            password_hash,
            created_at: Utc::now(),
        };

        let identity = self.repo.create(&identity).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => IdentityError::Conflict,
            other => IdentityError::Repository(other),
        })?;

        info!(identity_id = %identity.id, "identity registered");
        Ok(identity)
    }

    /// Check a username/password pair.
    ///
    /// Unknown usernames and wrong passwords both return `InvalidCredentials`
    /// after one full password verification.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<Identity, IdentityError> {
        if credentials.username.trim().is_empty() || credentials.password.is_empty() {
            return Err(IdentityError::Validation(
                "username and password required".to_string(),
            ));
        }

        let found = self.repo.find_by_username(&credentials.username).await?;
        let stored: Arc<str> = match &found {
            Some(identity) => identity.password_hash.as_str().into(),
            None => self.decoy_hash.clone(),
        };

        let hasher = self.hasher.clone();
        let password = credentials.password.clone();
        let valid = tokio::task::spawn_blocking(move || hasher.verify(&password, &stored))
            .await
            .map_err(|e| IdentityError::Hashing(e.to_string()))?;

        match found {
            Some(identity) if valid => Ok(identity),
            Some(identity) => {
                warn!(identity_id = %identity.id, "login attempt with wrong password");
                Err(IdentityError::InvalidCredentials)
            }
            None => {
                warn!("login attempt for unknown username");
                Err(IdentityError::InvalidCredentials)
            }
        }
    }
}

fn validate(credentials: &Credentials) -> Result<(), IdentityError> {
    if credentials.username.trim().is_empty() || credentials.password.is_empty() {
        return Err(IdentityError::Validation(
            "username and password required".to_string(),
        ));
    }
    if credentials.username.chars().count() > MAX_USERNAME_CHARS {
        return Err(IdentityError::Validation(format!(
            "username must be at most {MAX_USERNAME_CHARS} characters"
        )));
    }
    if credentials.password.len() > MAX_PASSWORD_BYTES {
        return Err(IdentityError::Validation(format!(
            "password must be at most {MAX_PASSWORD_BYTES} bytes"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::testing::{MemoryIdentityRepo, PlainHasher};

    fn creds(username: &str, password: &str) -> Credentials {
        Credentials {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    fn service() -> IdentityService<MemoryIdentityRepo, PlainHasher> {
        IdentityService::new(MemoryIdentityRepo::default(), PlainHasher).unwrap()
    }

    /// Counts verifications so tests can see the KDF ran.
    #[derive(Clone, Default)]
    struct CountingHasher {
        verifies: Arc<AtomicUsize>,
    }

    impl CredentialHasher for CountingHasher {
        fn hash(&self, password: &str) -> Result<String, IdentityError> {
            PlainHasher.hash(password)
        }

        fn verify(&self, password: &str, stored_hash: &str) -> bool {
            self.verifies.fetch_add(1, Ordering::SeqCst);
            PlainHasher.verify(password, stored_hash)
        }
    }

    struct BrokenHasher;

    impl CredentialHasher for BrokenHasher {
        fn hash(&self, _password: &str) -> Result<String, IdentityError> {
            Err(IdentityError::Hashing("no entropy".to_string()))
        }

        fn verify(&self, _password: &str, _stored_hash: &str) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn register_then_authenticate() {
        let svc = service();
        let registered = svc.register(&creds("alice", "hunter2")).await.unwrap();
        assert_ne!(registered.password_hash, "hunter2");

        let authed = svc.authenticate(&creds("alice", "hunter2")).await.unwrap();
        assert_eq!(authed.id, registered.id);
        assert_eq!(authed.username, "alice");
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let svc = service();
        svc.register(&creds("alice", "one")).await.unwrap();
        let err = svc.register(&creds("alice", "two")).await.unwrap_err();
        assert!(matches!(err, IdentityError::Conflict));
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_look_the_same() {
        let svc = service();
        svc.register(&creds("alice", "right")).await.unwrap();

        let unknown = svc.authenticate(&creds("mallory", "right")).await.unwrap_err();
        let wrong = svc.authenticate(&creds("alice", "wrong")).await.unwrap_err();

        assert!(matches!(unknown, IdentityError::InvalidCredentials));
        assert!(matches!(wrong, IdentityError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn unknown_user_still_runs_verification() {
        let hasher = CountingHasher::default();
        let verifies = hasher.verifies.clone();
        let svc = IdentityService::new(MemoryIdentityRepo::default(), hasher).unwrap();
        svc.register(&creds("alice", "right")).await.unwrap();

        svc.authenticate(&creds("mallory", "right")).await.unwrap_err();
        assert_eq!(verifies.load(Ordering::SeqCst), 1);

        svc.authenticate(&creds("alice", "wrong")).await.unwrap_err();
        assert_eq!(verifies.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn decoy_password_does_not_log_in_unknown_user() {
        let svc = service();
        let err = svc
            .authenticate(&creds("nobody", DECOY_PASSWORD))
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::InvalidCredentials));
    }

    #[test]
    fn construction_fails_when_hasher_fails() {
        let result = IdentityService::new(MemoryIdentityRepo::default(), BrokenHasher);
        assert!(matches!(result, Err(IdentityError::Hashing(_))));
    }

    #[tokio::test]
    async fn empty_fields_are_rejected() {
        let svc = service();
        assert!(matches!(
            svc.register(&creds("", "pw")).await.unwrap_err(),
            IdentityError::Validation(_)
        ));
        assert!(matches!(
            svc.register(&creds("bob", "")).await.unwrap_err(),
            IdentityError::Validation(_)
        ));
        assert!(matches!(
            svc.authenticate(&creds("   ", "pw")).await.unwrap_err(),
            IdentityError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn overlong_username_is_rejected() {
        let svc = service();
        let long = "x".repeat(65);
        assert!(matches!(
            svc.register(&creds(&long, "pw")).await.unwrap_err(),
            IdentityError::Validation(_)
        ));
    }
}
