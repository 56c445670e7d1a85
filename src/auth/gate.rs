//! Authorization gate for protected routes
//!
//! Runs before the handler. Outcomes:
//! - no `token` cookie            -> `Unauthorized` (401), nothing verified
//! - bad signature/garbage/expired -> `Forbidden` (403)
//! - valid                         -> decoded `Claims` inserted into the
//!   request extensions for the handler to read

use hyper::{HeaderMap, Request};
use tracing::{debug, warn};

use crate::auth::cookie::{extract_cookie_value, TOKEN_COOKIE_NAME};
use crate::auth::jwt::{Claims, TokenAuthority, TokenVerdict};
use crate::types::AppError;

#[derive(Debug, Clone)]
pub struct AuthGate {
    authority: TokenAuthority,
}

impl AuthGate {
    pub fn new(authority: TokenAuthority) -> Self {
        Self { authority }
    }

    pub fn authority(&self) -> &TokenAuthority {
        &self.authority
    }

    /// Verify the token cookie and return the caller's claims
    pub fn authorize(&self, headers: &HeaderMap) -> Result<Claims, AppError> {
        let token = extract_cookie_value(headers, TOKEN_COOKIE_NAME)
            .ok_or_else(|| AppError::Unauthorized("No token cookie".into()))?;

        match self.authority.verify(&token) {
            TokenVerdict::Valid(claims) => {
                debug!(email = ?claims.identity.email(), "Token accepted");
                Ok(claims)
            }
            TokenVerdict::Expired => {
                warn!("Rejected expired token");
                Err(AppError::Forbidden("Token expired".into()))
            }
            TokenVerdict::Invalid(reason) => {
                warn!("Rejected invalid token: {}", reason);
                Err(AppError::Forbidden(reason))
            }
        }
    }

    /// Verify the request and attach the caller's claims to it
    pub fn admit<B>(&self, req: &mut Request<B>) -> Result<(), AppError> {
        let claims = self.authorize(req.headers())?;
        req.extensions_mut().insert(claims);
        Ok(())
    }
}

/// Claims attached by [`AuthGate::admit`], if the request passed the gate
pub fn caller<B>(req: &Request<B>) -> Option<&Claims> {
    req.extensions().get::<Claims>()
}

/// Require that the admitted caller owns the resource addressed by `email`
pub fn require_owner<B>(req: &Request<B>, email: &str) -> Result<(), AppError> {
    let claims =
        caller(req).ok_or_else(|| AppError::Unauthorized("Request did not pass the gate".into()))?;

    match claims.identity.email() {
        Some(owner) if owner.eq_ignore_ascii_case(email) => Ok(()),
        _ => Err(AppError::Forbidden(format!(
            "Token does not grant access to {}",
            email
        ))),
    }
}
