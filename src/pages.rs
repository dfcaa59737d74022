//! Site content pages with their access rules.

use axum::{response::Html, routing::get, Router};

use crate::{
    auth::{Admin, RequireAuth, RequireRole},
    session::Session,
    state::AppState,
    views,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/pagepublic", get(page_public))
        .route("/pageauthonly", get(page_auth_only))
        .route("/pageadminonly", get(page_admin_only))
        .route("/health", get(|| async { "ok" }))
}

async fn home(session: Session) -> Html<String> {
    Html(views::home(session.user()))
}

async fn page_public(session: Session) -> Html<String> {
    Html(views::page_public(session.user()))
}

async fn page_auth_only(RequireAuth(user): RequireAuth) -> Html<String> {
    Html(views::page_auth_only(Some(&user)))
}

async fn page_admin_only(admin: RequireRole<Admin>) -> Html<String> {
    Html(views::page_admin_only(Some(admin.user())))
}
