//! Authentication and authorization for altprod
//!
//! Provides:
//! - Access token issuance and verification (HS256 JWT)
//! - Token cookie policy per deployment mode
//! - The authorization gate run in front of protected routes

pub mod cookie;
pub mod gate;
pub mod jwt;

pub use cookie::{extract_cookie_value, CookiePolicy, SameSite, TOKEN_COOKIE_NAME};
pub use gate::{caller, require_owner, AuthGate};
pub use jwt::{Claims, Identity, IssuedToken, TokenAuthority, TokenVerdict};
