use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use axum_extra::extract::WithRejection;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        extractors::RequireAuth,
        password::{hash_password, verify_password},
    },
    error::AppError,
    forms::{LoginForm, RegistrationForm},
    session::Session,
    state::AppState,
    users::NewUser,
    views,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/register", get(register_page).post(register))
        .route("/logout", get(logout))
        .route("/nopermission", get(no_permission))
}

#[instrument(skip(session))]
pub async fn login_page(mut session: Session) -> (Session, Html<String>) {
    session.ensure_request_path();
    let page = views::login(&LoginForm::default(), &Default::default(), session.user());
    (session, Html(page))
}

#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    mut session: Session,
    WithRejection(Form(form), _): WithRejection<Form<LoginForm>, AppError>,
) -> Result<Response, AppError> {
    session.ensure_request_path();
    let form = form.normalize();
    let mut errors = form.validate();

    if errors.is_empty() {
        match state.users.find_by_username(&form.username).await? {
            None => {
                warn!(username = %form.username, "login for unknown user");
                errors.add("username", "User not found.");
            }
            Some(user) => {
                if verify_password(form.password.clone(), user.password_hash.clone()).await? {
                    session.log_in(&user);
                    let target = session.ensure_request_path().to_string();
                    info!(username = %user.username, redirect = %target, "user logged in");
                    return Ok((session, Redirect::to(&target)).into_response());
                }
                warn!(username = %user.username, "login with incorrect password");
                errors.add("password", "Incorrect password.");
            }
        }
    }

    let page = views::login(&form, &errors, session.user());
    Ok((session, Html(page)).into_response())
}

#[instrument(skip(session))]
pub async fn register_page(session: Session) -> Html<String> {
    Html(views::register(
        &RegistrationForm::default(),
        &Default::default(),
        session.user(),
    ))
}

#[instrument(skip(state, session, form))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    WithRejection(Form(form), _): WithRejection<Form<RegistrationForm>, AppError>,
) -> Result<Response, AppError> {
    let form = form.normalize();
    let mut errors = form.validate();

    if errors.is_empty() {
        let new_user = NewUser {
            username: form.username.clone(),
            firstname: form.firstname.clone(),
            lastname: form.lastname.clone(),
            email: form.email.clone(),
            password_hash: hash_password(form.password.clone()).await?,
        };
        match state.users.create(new_user).await? {
            Some(user) => {
                info!(username = %user.username, roles = ?user.roles, "user registered");
                return Ok(Redirect::to("/login").into_response());
            }
            None => {
                warn!(username = %form.username, "username already registered");
                errors.add("username", "User already exists");
            }
        }
    }

    Ok(Html(views::register(&form, &errors, session.user())).into_response())
}

#[instrument(skip(session))]
pub async fn logout(mut session: Session) -> (Session, Redirect) {
    if let Some(user) = session.user() {
        info!(username = %user.username, "user logged out");
    }
    session.clear();
    (session, Redirect::to("/"))
}

#[instrument(skip(state, session, user))]
pub async fn no_permission(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
) -> Html<String> {
    let requested = format!(
        "{}{}",
        state.config.sitebase_url,
        session.request_path().unwrap_or("/")
    );
    Html(views::no_permission(Some(&user), &requested))
}
