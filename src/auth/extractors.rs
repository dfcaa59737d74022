use std::marker::PhantomData;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use tracing::debug;

use crate::session::{Session, SessionKeys, SessionUser};
use crate::users::ADMIN_ROLE;

/// A role name a route can be gated on.
pub trait RequiredRole: Send + Sync + 'static {
    const NAME: &'static str;
}

pub struct Admin;

impl RequiredRole for Admin {
    const NAME: &'static str = ADMIN_ROLE;
}

async fn session_from_parts<S>(parts: &mut Parts, state: &S) -> Session
where
    S: Send + Sync,
    SessionKeys: FromRef<S>,
{
    match Session::from_request_parts(parts, state).await {
        Ok(session) => session,
        Err(never) => match never {},
    }
}

/// Remembers where the visitor was headed, then sends them to `target`.
fn redirect_recording_path(mut session: Session, path: &str, target: &str) -> Response {
    session.set_request_path(path);
    (session, Redirect::to(target)).into_response()
}

/// Logged-in user; anonymous visitors are redirected to `/login`.
pub struct RequireAuth(pub SessionUser);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
    SessionKeys: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = session_from_parts(parts, state).await;
        match session.user().cloned() {
            Some(user) => Ok(RequireAuth(user)),
            None => {
                debug!(path = %parts.uri.path(), "anonymous request, redirecting to login");
                Err(redirect_recording_path(session, parts.uri.path(), "/login"))
            }
        }
    }
}

/// Logged-in user holding role `R`. Users without it land on `/nopermission`.
pub struct RequireRole<R: RequiredRole>(pub SessionUser, PhantomData<R>);

impl<R: RequiredRole> RequireRole<R> {
    pub fn user(&self) -> &SessionUser {
        &self.0
    }
}

#[async_trait]
impl<S, R> FromRequestParts<S> for RequireRole<R>
where
    S: Send + Sync,
    SessionKeys: FromRef<S>,
    R: RequiredRole,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
        if user.has_role(R::NAME) {
            return Ok(RequireRole(user, PhantomData));
        }
        debug!(
            username = %user.username,
            role = R::NAME,
            path = %parts.uri.path(),
            "missing role, redirecting to nopermission"
        );
        let session = session_from_parts(parts, state).await;
        Err(redirect_recording_path(session, parts.uri.path(), "/nopermission"))
    }
}
