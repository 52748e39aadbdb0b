//! Session token issuance and verification.
//!
//! Tokens are HS256 JWTs carrying `{sub, iat, exp}` with an absolute expiry.
//! Verification pins the algorithm and never surfaces an error: anything that
//! is not a valid, unexpired token signed with our key is simply "no session".

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use parley_types::error::SessionError;
use parley_types::identity::IdentityId;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session";

/// Claim set embedded in every session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Mints and verifies session tokens with a shared HMAC secret.
#[derive(Clone)]
pub struct SessionManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Token lifetime, also used as the cookie `Max-Age`.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, identity_id: IdentityId) -> Result<String, SessionError> {
        self.issue_at(identity_id, Utc::now())
    }

    /// Mint a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        identity_id: IdentityId,
        now: DateTime<Utc>,
    ) -> Result<String, SessionError> {
        let iat = now.timestamp();
        let claims = SessionClaims {
            sub: identity_id.to_string(),
            iat,
            exp: iat.saturating_add(self.ttl.as_secs() as i64),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| SessionError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Option<IdentityId> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token as if the current time were `now`.
    ///
    /// Expiry is checked here rather than by `jsonwebtoken` so that `now`
    /// is honoured; a token is expired once `now >= exp`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Option<IdentityId> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;

        let data = match decode::<SessionClaims>(token, &self.decoding_key, &validation) {
            Ok(data) => data,
            Err(e) => {
                debug!(error = ?e.kind(), "session token rejected");
                return None;
            }
        };

        if now.timestamp() >= data.claims.exp {
            debug!(sub = %data.claims.sub, "session token expired");
            return None;
        }

        data.claims.sub.parse().ok()
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    const SECRET: &[u8] = b"test-secret-with-enough-entropy-for-hs256";

    fn manager() -> SessionManager {
        SessionManager::new(SECRET, Duration::from_secs(86_400))
    }

    #[test]
    fn test_issue_then_verify_returns_same_identity() {
        let sessions = manager();
        let alice = IdentityId::new();
        let bob = IdentityId::new();

        let token = sessions.issue(alice).unwrap();
        let verified = sessions.verify(&token);

        assert_eq!(verified, Some(alice));
        assert_ne!(verified, Some(bob));
    }

    #[test]
    fn test_ttl_boundary() {
        let sessions = manager();
        let id = IdentityId::new();
        let issued = Utc::now();
        let token = sessions.issue_at(id, issued).unwrap();

        assert_eq!(
            sessions.verify_at(&token, issued + ChronoDuration::seconds(1)),
            Some(id)
        );
        assert_eq!(
            sessions.verify_at(&token, issued + ChronoDuration::hours(23)),
            Some(id)
        );
        assert_eq!(
            sessions.verify_at(&token, issued + ChronoDuration::hours(24)),
            None
        );
        assert_eq!(
            sessions.verify_at(&token, issued + ChronoDuration::hours(25)),
            None
        );
    }

    #[test]
    fn test_tampered_signature_fails() {
        let sessions = manager();
        let token = sessions.issue(IdentityId::new()).unwrap();

        let (head, sig) = token.rsplit_once('.').unwrap();
        let mut sig_bytes = sig.as_bytes().to_vec();
        sig_bytes[0] = if sig_bytes[0] == b'A' { b'B' } else { b'A' };
        let tampered = format!("{head}.{}", String::from_utf8(sig_bytes).unwrap());

        assert!(sessions.verify(&tampered).is_none());
    }

    #[test]
    fn test_tampered_payload_fails() {
        let sessions = manager();
        let token = sessions.issue(IdentityId::new()).unwrap();
        let other = sessions.issue(IdentityId::new()).unwrap();

        // Header and signature of one token with the payload of another.
        let parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other.split('.').collect();
        let spliced = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);

        assert!(sessions.verify(&spliced).is_none());
    }

    #[test]
    fn test_other_secret_fails() {
        let token = manager().issue(IdentityId::new()).unwrap();
        let other = SessionManager::new(b"a-completely-different-secret", Duration::from_secs(60));
        assert!(other.verify(&token).is_none());
    }

    #[test]
    fn test_other_algorithm_rejected() {
        let claims = SessionClaims {
            sub: IdentityId::new().to_string(),
            iat: Utc::now().timestamp(),
            exp: Utc::now().timestamp() + 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert!(manager().verify(&token).is_none());
    }

    #[test]
    fn test_garbage_is_no_session() {
        let sessions = manager();
        assert!(sessions.verify("").is_none());
        assert!(sessions.verify("not.a.jwt").is_none());
    }

    #[test]
    fn test_non_uuid_subject_is_no_session() {
        let claims = SessionClaims {
            sub: "admin".to_string(),
            iat: Utc::now().timestamp(),
            exp: Utc::now().timestamp() + 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert!(manager().verify(&token).is_none());
    }
}
