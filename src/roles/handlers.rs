use axum::{extract::State, response::Html, routing::get, Form, Router};
use axum_extra::extract::WithRejection;
use tracing::{info, instrument, warn};

use crate::{
    auth::{Admin, RequireRole},
    error::AppError,
    forms::{FormErrors, RoleForm},
    state::AppState,
    users::RoleUpdate,
    views,
};

pub fn role_routes() -> Router<AppState> {
    Router::new().route("/roles", get(roles_page).post(update_roles))
}

#[instrument(skip_all)]
pub async fn roles_page(
    State(state): State<AppState>,
    admin: RequireRole<Admin>,
) -> Result<Html<String>, AppError> {
    let users = state.users.list().await?;
    Ok(Html(views::roles(
        &RoleForm::default(),
        &FormErrors::default(),
        &[],
        &users,
        Some(admin.user()),
    )))
}

#[instrument(skip_all)]
pub async fn update_roles(
    State(state): State<AppState>,
    admin: RequireRole<Admin>,
    WithRejection(Form(form), _): WithRejection<Form<RoleForm>, AppError>,
) -> Result<Html<String>, AppError> {
    let form = form.normalize();
    let mut errors = form.validate();
    let mut messages = Vec::new();

    if errors.is_empty() {
        apply_role_changes(&state, &form, &admin.user().username, &mut errors, &mut messages)
            .await?;
    }

    let users = state.users.list().await?;
    Ok(Html(views::roles(
        &form,
        &errors,
        &messages,
        &users,
        Some(admin.user()),
    )))
}

async fn apply_role_changes(
    state: &AppState,
    form: &RoleForm,
    actor: &str,
    errors: &mut FormErrors,
    messages: &mut Vec<String>,
) -> Result<(), AppError> {
    let target = &form.username;
    if state.users.find_by_username(target).await?.is_none() {
        errors.add("username", "User does not exist.");
        return Ok(());
    }

    if !form.addrole.is_empty() {
        match state.users.add_role(target, &form.addrole).await? {
            RoleUpdate::Updated(roles) => {
                info!(actor, username = %target, role = %form.addrole, ?roles, "role added");
                messages.push(format!("Added: {} for: {}", form.addrole, target));
            }
            RoleUpdate::Unchanged => errors.add("addrole", "User already has this role."),
            RoleUpdate::NoSuchUser => errors.add("username", "User does not exist."),
        }
    }

    if !form.remrole.is_empty() {
        match state.users.remove_role(target, &form.remrole).await? {
            RoleUpdate::Updated(roles) => {
                info!(actor, username = %target, role = %form.remrole, ?roles, "role removed");
                messages.push(format!("Removed: {} for: {}", form.remrole, target));
            }
            RoleUpdate::Unchanged => {
                warn!(username = %target, role = %form.remrole, "role not held by user");
                errors.add("remrole", "Role does not exist for this user.");
            }
            RoleUpdate::NoSuchUser => errors.add("username", "User does not exist."),
        }
    }

    Ok(())
}
