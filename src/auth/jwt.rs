//! Access token issuance and verification
//!
//! Tokens carry whatever identity object the caller presented at sign-in
//! (minimally an email) plus `iat`/`exp`. They are signed with HS256 using
//! the shared ACCESS_TOKEN_SECRET. Expiry is the only invalidation
//! mechanism; there is no revocation list.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::MIN_SECRET_LEN;
use crate::types::AppError;

/// Claim names the authority controls; stripped from caller payloads
const RESERVED_CLAIMS: [&str; 3] = ["iat", "exp", "nbf"];

/// Caller identity as presented at sign-in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(Map<String, Value>);

impl Identity {
    /// Build an identity from a sign-in payload.
    ///
    /// The payload must be a JSON object with a non-empty `email` string.
    pub fn from_payload(payload: Value) -> Result<Self, AppError> {
        let mut fields = match payload {
            Value::Object(fields) => fields,
            _ => {
                return Err(AppError::BadRequest(
                    "Token payload must be a JSON object".into(),
                ))
            }
        };

        match fields.get("email") {
            Some(Value::String(email)) if !email.trim().is_empty() => {}
            _ => {
                return Err(AppError::BadRequest(
                    "Token payload requires a non-empty email".into(),
                ))
            }
        }

        for claim in RESERVED_CLAIMS {
            fields.remove(claim);
        }

        Ok(Self(fields))
    }

    pub fn email(&self) -> Option<&str> {
        self.0.get("email").and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Payload stored in the token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(flatten)]
    pub identity: Identity,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// A freshly signed token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: u64,
    pub max_age_seconds: u64,
}

/// Result of token verification
#[derive(Debug)]
pub enum TokenVerdict {
    Valid(Claims),
    Expired,
    Invalid(String),
}

/// Signs and verifies access tokens with a shared secret
#[derive(Clone)]
pub struct TokenAuthority {
    secret: String,
    expiry_seconds: u64,
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("expiry_seconds", &self.expiry_seconds)
            .finish_non_exhaustive()
    }
}

impl TokenAuthority {
    /// Create a new token authority
    ///
    /// Returns an error if the secret is empty or too short
    pub fn new(secret: String, expiry_seconds: u64) -> Result<Self, AppError> {
        if secret.is_empty() {
            return Err(AppError::Config("ACCESS_TOKEN_SECRET is empty".into()));
        }

        if secret.len() < MIN_SECRET_LEN {
            return Err(AppError::Config(format!(
                "ACCESS_TOKEN_SECRET must be at least {} characters",
                MIN_SECRET_LEN
            )));
        }

        Ok(Self {
            secret,
            expiry_seconds,
        })
    }

    pub fn expiry_seconds(&self) -> u64 {
        self.expiry_seconds
    }

    /// Sign a token for the given identity, expiring `expiry_seconds` from now
    pub fn issue(&self, identity: Identity) -> Result<IssuedToken, AppError> {
        self.issue_at(identity, unix_now()?)
    }

    pub(crate) fn issue_at(
        &self,
        identity: Identity,
        issued_at: u64,
    ) -> Result<IssuedToken, AppError> {
        let claims = Claims {
            identity,
            iat: issued_at,
            exp: issued_at + self.expiry_seconds,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;

        Ok(IssuedToken {
            token,
            expires_at: claims.exp,
            max_age_seconds: self.expiry_seconds,
        })
    }

    /// Verify signature and expiry, decoding the claims on success
    pub fn verify(&self, token: &str) -> TokenVerdict {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        match decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        ) {
            Ok(token_data) => TokenVerdict::Valid(token_data.claims),
            Err(err) => match err.kind() {
                ErrorKind::ExpiredSignature => TokenVerdict::Expired,
                ErrorKind::InvalidSignature => TokenVerdict::Invalid("Invalid signature".into()),
                ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) => {
                    TokenVerdict::Invalid("Malformed token".into())
                }
                _ => TokenVerdict::Invalid("Token validation failed".into()),
            },
        }
    }
}

fn unix_now() -> Result<u64, AppError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| AppError::Internal(format!("System time error: {}", e)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) const TEST_SECRET: &str = "test-secret-that-is-at-least-32-characters-long";

    pub(crate) fn test_authority() -> TokenAuthority {
        TokenAuthority::new(TEST_SECRET.into(), 3600).unwrap()
    }

    fn identity(email: &str) -> Identity {
        Identity::from_payload(json!({ "email": email })).unwrap()
    }

    #[test]
    fn test_issue_then_verify_round_trips_payload() {
        let authority = test_authority();
        let original = identity("a@example.com");

        let issued = authority.issue(original.clone()).unwrap();
        assert!(!issued.token.is_empty());
        assert_eq!(issued.max_age_seconds, 3600);

        match authority.verify(&issued.token) {
            TokenVerdict::Valid(claims) => {
                assert_eq!(claims.identity, original);
                assert_eq!(claims.identity.email(), Some("a@example.com"));
                assert_eq!(claims.exp, claims.iat + 3600);
            }
            other => panic!("expected valid token, got {:?}", other),
        }
    }

    #[test]
    fn test_extra_identity_fields_survive() {
        let authority = test_authority();
        let original =
            Identity::from_payload(json!({ "email": "b@example.com", "name": "Bea", "uid": 7 }))
                .unwrap();
        let issued = authority.issue(original.clone()).unwrap();

        let TokenVerdict::Valid(claims) = authority.verify(&issued.token) else {
            panic!("expected valid token");
        };
        assert_eq!(claims.identity, original);
    }

    #[test]
    fn test_expired_token() {
        let authority = test_authority();
        let long_ago = unix_now().unwrap() - 2 * 3600;
        let issued = authority.issue_at(identity("a@example.com"), long_ago).unwrap();

        assert!(matches!(authority.verify(&issued.token), TokenVerdict::Expired));
    }

    #[test]
    fn test_malformed_token() {
        let authority = test_authority();
        assert!(matches!(authority.verify("not-a-token"), TokenVerdict::Invalid(_)));
        assert!(matches!(authority.verify(""), TokenVerdict::Invalid(_)));
    }

    #[test]
    fn test_wrong_secret() {
        let issuer = test_authority();
        let verifier =
            TokenAuthority::new("different-secret-that-is-at-least-32-characters".into(), 3600)
                .unwrap();

        let issued = issuer.issue(identity("a@example.com")).unwrap();
        assert!(matches!(verifier.verify(&issued.token), TokenVerdict::Invalid(_)));
    }

    #[test]
    fn test_payload_cannot_choose_expiry() {
        let authority = test_authority();
        let sneaky = Identity::from_payload(json!({
            "email": "a@example.com",
            "exp": 9_999_999_999u64,
            "iat": 0
        }))
        .unwrap();
        assert!(sneaky.fields().get("exp").is_none());

        let long_ago = unix_now().unwrap() - 2 * 3600;
        let issued = authority.issue_at(sneaky, long_ago).unwrap();
        assert!(matches!(authority.verify(&issued.token), TokenVerdict::Expired));
    }

    #[test]
    fn test_payload_requires_email() {
        assert!(Identity::from_payload(json!({ "name": "nobody" })).is_err());
        assert!(Identity::from_payload(json!({ "email": "  " })).is_err());
        assert!(Identity::from_payload(json!(["a@example.com"])).is_err());
    }

    #[test]
    fn test_secret_validation() {
        assert!(TokenAuthority::new("short".into(), 3600).is_err());
        assert!(TokenAuthority::new("".into(), 3600).is_err());
        assert!(TokenAuthority::new(TEST_SECRET.into(), 3600).is_ok());
    }
}
