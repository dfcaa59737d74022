//! Signed, cookie-held session state.
//!
//! The session is a small JWT (HS256, keyed by `SECRET_KEY`) stored in an
//! HttpOnly cookie. Handlers take [`Session`] as an extractor and hand it
//! back in their response to persist any change.

use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponseParts, ResponseParts},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::{config::SessionConfig, error::AppError, users::User};

/// The logged-in user as remembered by the session. No password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub roles: Vec<String>,
}

impl SessionUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            firstname: user.firstname.clone(),
            lastname: user.lastname.clone(),
            email: user.email.clone(),
            roles: user.roles.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
    /// Path to return to after a successful login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_path: Option<String>,
}

impl SessionData {
    pub fn is_empty(&self) -> bool {
        self.user.is_none() && self.request_path.is_none()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    #[serde(flatten)]
    data: SessionData,
    iat: u64,
    exp: u64,
}

/// Signing keys and cookie attributes for sessions.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    cookie_name: String,
    ttl: Duration,
    secure: bool,
}

impl SessionKeys {
    pub fn new(secret: &str, config: &SessionConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            cookie_name: config.cookie_name.clone(),
            ttl: Duration::seconds(config.ttl_minutes.saturating_mul(60)),
            secure: config.secure,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn encode(&self, data: &SessionData) -> Result<String, AppError> {
        let now = OffsetDateTime::now_utc();
        let expires = now.checked_add(self.ttl).ok_or_else(|| {
            anyhow::anyhow!("session lifetime of {} is out of range", self.ttl)
        })?;
        let claims = SessionClaims {
            data: data.clone(),
            iat: now.unix_timestamp().max(0) as u64,
            exp: expires.unix_timestamp().max(0) as u64,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn decode(&self, token: &str) -> Result<SessionData, jsonwebtoken::errors::Error> {
        let validation = Validation::default();
        let data = decode::<SessionClaims>(token, &self.decoding, &validation)?;
        Ok(data.claims.data)
    }

    fn cookie(&self, value: String) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(self.ttl)
            .build()
    }

    fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), ""))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(Duration::ZERO)
            .build()
    }
}

/// Per-request session. Unreadable cookies yield an empty session.
pub struct Session {
    data: SessionData,
    keys: SessionKeys,
}

impl Session {
    pub fn new(data: SessionData, keys: SessionKeys) -> Self {
        Self { data, keys }
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.data.user.as_ref()
    }

    pub fn log_in(&mut self, user: &User) {
        self.data.user = Some(SessionUser::from(user));
    }

    pub fn request_path(&self) -> Option<&str> {
        self.data.request_path.as_deref()
    }

    pub fn set_request_path(&mut self, path: impl Into<String>) {
        self.data.request_path = Some(path.into());
    }

    /// Defaults the post-login target to `/` when nothing was requested.
    pub fn ensure_request_path(&mut self) -> &str {
        self.data.request_path.get_or_insert_with(|| "/".to_string())
    }

    pub fn clear(&mut self) {
        self.data = SessionData::default();
    }

    fn to_cookie(&self) -> Result<Cookie<'static>, AppError> {
        if self.data.is_empty() {
            return Ok(self.keys.removal_cookie());
        }
        let token = self.keys.encode(&self.data)?;
        Ok(self.keys.cookie(token))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    SessionKeys: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = SessionKeys::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        let data = match jar.get(keys.cookie_name()) {
            Some(cookie) => keys.decode(cookie.value()).unwrap_or_else(|e| {
                debug!(error = %e, "discarding unreadable session cookie");
                SessionData::default()
            }),
            None => SessionData::default(),
        };
        Ok(Session { data, keys })
    }
}

impl IntoResponseParts for Session {
    type Error = AppError;

    fn into_response_parts(self, res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        let jar = CookieJar::new().add(self.to_cookie()?);
        jar.into_response_parts(res).map_err(|never| match never {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::header::SET_COOKIE, response::IntoResponse};

    fn keys_with(secret: &str, ttl_minutes: i64, secure: bool) -> SessionKeys {
        SessionKeys::new(
            secret,
            &SessionConfig {
                cookie_name: "test_session".into(),
                ttl_minutes,
                secure,
            },
        )
    }

    fn keys_with_ttl(secret: &str, ttl_minutes: i64) -> SessionKeys {
        keys_with(secret, ttl_minutes, false)
    }

    fn sample_data() -> SessionData {
        SessionData {
            user: Some(SessionUser {
                username: "alice".into(),
                firstname: "Alice".into(),
                lastname: "Liddell".into(),
                email: "alice@example.com".into(),
                roles: vec!["admin".into()],
            }),
            request_path: Some("/pageadminonly".into()),
        }
    }

    #[test]
    fn encode_and_decode_roundtrip() {
        let keys = keys_with_ttl("secret", 10);
        let token = keys.encode(&sample_data()).expect("encode");
        assert_eq!(keys.decode(&token).expect("decode"), sample_data());
    }

    #[test]
    fn token_signed_with_another_key_is_rejected() {
        let token = keys_with_ttl("secret-a", 10).encode(&sample_data()).unwrap();
        assert!(keys_with_ttl("secret-b", 10).decode(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = keys_with_ttl("secret", -10);
        let token = keys.encode(&sample_data()).unwrap();
        assert!(keys.decode(&token).is_err());
    }

    #[test]
    fn ensure_request_path_defaults_to_root_only_once() {
        let keys = keys_with_ttl("secret", 10);
        let mut session = Session::new(SessionData::default(), keys.clone());
        assert_eq!(session.ensure_request_path(), "/");

        let mut session = Session::new(sample_data(), keys);
        assert_eq!(session.ensure_request_path(), "/pageadminonly");
    }

    #[test]
    fn populated_session_sets_http_only_cookie() {
        let session = Session::new(sample_data(), keys_with_ttl("secret", 10));
        let res = (session, "ok").into_response();
        let cookie = res.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("test_session="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
    }

    #[test]
    fn https_site_marks_cookie_secure() {
        let session = Session::new(sample_data(), keys_with("secret", 10, true));
        let res = (session, "ok").into_response();
        let cookie = res.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.contains("; Secure"));

        let session = Session::new(sample_data(), keys_with_ttl("secret", 10));
        let res = (session, "ok").into_response();
        let cookie = res.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn oversized_lifetime_is_an_error_not_a_panic() {
        let keys = keys_with_ttl("secret", 200_000_000_000);
        let err = keys.encode(&sample_data()).unwrap_err();
        assert!(err.to_string().contains("out of range"));

        let res = (Session::new(sample_data(), keys), "ok").into_response();
        assert_eq!(res.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn cleared_session_expires_cookie() {
        let mut session = Session::new(sample_data(), keys_with_ttl("secret", 10));
        session.clear();
        let res = (session, "ok").into_response();
        let cookie = res.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("test_session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}
