use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

use crate::config::AppConfig;
use crate::error::RaceError;
use crate::server::AppState;

const MAX_TOKEN_TTL_SECS: u64 = 366 * 24 * 60 * 60;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Not authenticated")]
    Missing,

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,

    #[error("Invalid credentials")]
    BadCredentials,

    #[error("Admin login is not configured")]
    LoginDisabled,
}

#[derive(Clone, Debug)]
struct IssuedToken {
    username: String,
    issued_at: DateTime<Utc>,
}

/// Bearer tokens handed out by `/auth/login`, valid for a fixed TTL.
#[derive(Debug)]
pub struct TokenRegistry {
    tokens: HashMap<String, IssuedToken>,
    ttl: Duration,
}

impl TokenRegistry {
    pub fn new(ttl_secs: u64) -> Self {
        TokenRegistry {
            tokens: HashMap::new(),
            ttl: Duration::seconds(ttl_secs.min(MAX_TOKEN_TTL_SECS) as i64),
        }
    }

    /// Mint a token for `username`. Tokens that have outlived the TTL are
    /// swept first.
    pub fn issue<R: Rng + ?Sized>(&mut self, username: &str, now: DateTime<Utc>, rng: &mut R) -> String {
        let ttl = self.ttl;
        self.tokens.retain(|_, issued| now - issued.issued_at <= ttl);
        let bytes: [u8; 32] = rng.gen();
        let token: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        self.tokens.insert(
            token.clone(),
            IssuedToken {
                username: username.to_string(),
                issued_at: now,
            },
        );
        token
    }

    /// Returns the username the token was issued to. Expired tokens are
    /// forgotten on first use.
    pub fn verify(&mut self, token: &str, now: DateTime<Utc>) -> Result<String, AuthError> {
        let issued = self.tokens.get(token).ok_or(AuthError::Invalid)?;
        if now - issued.issued_at > self.ttl {
            self.tokens.remove(token);
            return Err(AuthError::Expired);
        }
        Ok(issued.username.clone())
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

pub fn check_credentials(config: &AppConfig, username: &str, password: &str) -> Result<(), AuthError> {
    if config.admin_username.trim().is_empty() || config.admin_password.is_empty() {
        return Err(AuthError::LoginDisabled);
    }
    if username == config.admin_username && password == config.admin_password {
        Ok(())
    } else {
        Err(AuthError::BadCredentials)
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let raw = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AuthError::Missing)?;
    let (scheme, token) = raw.trim().split_once(' ').ok_or(AuthError::Missing)?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(AuthError::Missing);
    }
    Ok(token.trim())
}

/// Extractor guarding the admin routes.
#[derive(Clone, Debug)]
pub struct AdminSession {
    pub username: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AdminSession {
    type Rejection = RaceError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let mut registry = state.tokens.lock().unwrap_or_else(|e| e.into_inner());
        match registry.verify(token, Utc::now()) {
            Ok(username) => Ok(AdminSession { username }),
            Err(e) => {
                warn!("Rejected admin request on {}: {e}", parts.uri.path());
                Err(e.into())
            }
        }
    }
}
