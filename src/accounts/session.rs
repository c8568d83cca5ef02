//! Signed session credentials (JWT, HS256), issued on successful
//! authentication. Distinct from the lifecycle tokens in `tokens`: a session
//! credential proves who you are, a lifecycle token authorizes one state
//! transition.

use anyhow::anyhow;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{models::User, Error};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub email: String,
    pub roles: Vec<Uuid>,
    pub iat: i64,
    pub exp: i64,
}

pub struct SessionSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validity: Duration,
}

impl SessionSigner {
    #[must_use]
    pub fn new(secret: &SecretString, ttl_minutes: u64) -> Self {
        let secret = secret.expose_secret().as_bytes();

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validity: Duration::minutes(i64::try_from(ttl_minutes).unwrap_or(60)),
        }
    }

    /// Issue a session credential carrying the user's identity and roles.
    pub fn issue(&self, user: &User) -> Result<String, Error> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user.id,
            email: user.email.clone(),
            roles: user.roles.clone(),
            iat: now.timestamp(),
            exp: (now + self.validity).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding).map_err(|e| Error::Internal(anyhow!(e)))
    }

    /// Validate a presented session credential and return its claims.
    pub fn verify(&self, credential: &str) -> Result<SessionClaims, Error> {
        decode::<SessionClaims>(credential, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| Error::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> SessionSigner {
        SessionSigner::new(&SecretString::from("sssh".to_string()), 60)
    }

    fn user() -> User {
        User::new("dave@x.com".to_string(), "hash".to_string())
    }

    #[test]
    fn issue_then_verify() {
        let signer = signer();
        let user = user();

        let credential = signer.issue(&user).unwrap();
        let claims = signer.verify(&credential).unwrap();

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, "dave@x.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn rejects_wrong_secret() {
        let credential = signer().issue(&user()).unwrap();
        let other = SessionSigner::new(&SecretString::from("different".to_string()), 60);

        assert!(matches!(
            other.verify(&credential),
            Err(Error::Unauthorized)
        ));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            signer().verify("not-a-jwt"),
            Err(Error::Unauthorized)
        ));
    }

    #[test]
    fn rejects_expired_session() {
        let signer = signer();
        let now = Utc::now();
        // Well past the default validation leeway
        let claims = SessionClaims {
            sub: Uuid::new_v4(),
            email: "dave@x.com".to_string(),
            roles: Vec::new(),
            iat: (now - Duration::hours(2)).timestamp(),
            exp: (now - Duration::hours(1)).timestamp(),
        };
        let credential = encode(&Header::default(), &claims, &signer.encoding).unwrap();

        assert!(matches!(
            signer.verify(&credential),
            Err(Error::Unauthorized)
        ));
    }
}
