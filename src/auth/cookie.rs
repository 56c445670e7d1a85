//! Token cookie handling
//!
//! The access token travels in an HTTP-only cookie named `token`. Its
//! cross-site attributes depend on the deployment mode:
//! - production: `Secure; SameSite=None` (frontend on another origin)
//! - development: `SameSite=Strict`, no `Secure` (plain-http localhost)

use hyper::header::COOKIE;
use hyper::HeaderMap;

use crate::config::DeploymentMode;

/// Cookie carrying the access token
pub const TOKEN_COOKIE_NAME: &str = "token";

/// SameSite attribute values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Security attributes applied to the token cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePolicy {
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
}

impl CookiePolicy {
    pub fn for_mode(mode: DeploymentMode) -> Self {
        match mode {
            DeploymentMode::Production => Self {
                http_only: true,
                secure: true,
                same_site: SameSite::None,
            },
            DeploymentMode::Development => Self {
                http_only: true,
                secure: false,
                same_site: SameSite::Strict,
            },
        }
    }

    /// `Set-Cookie` value carrying a token
    pub fn token_cookie(&self, token: &str, max_age_seconds: u64) -> String {
        self.render(token, max_age_seconds)
    }

    /// `Set-Cookie` value that removes the token cookie
    pub fn clear_cookie(&self) -> String {
        self.render("", 0)
    }

    fn render(&self, value: &str, max_age_seconds: u64) -> String {
        let mut cookie = format!(
            "{TOKEN_COOKIE_NAME}={value}; Path=/; Max-Age={max_age_seconds}"
        );
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie.push_str("; SameSite=");
        cookie.push_str(self.same_site.as_str());
        cookie
    }
}

/// Extract a cookie value from the request headers.
///
/// Browsers send one `Cookie` header; proxies may split it, so every
/// header line is searched. Empty values count as absent.
pub fn extract_cookie_value(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    for raw in headers.get_all(COOKIE) {
        let Ok(raw) = raw.to_str() else {
            continue;
        };
        for part in raw.split(';') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            if key.trim() == cookie_name {
                let value = value.trim();
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }

    None
}
