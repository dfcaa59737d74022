use crate::state::AppState;
use axum::Router;

pub mod extractors;
pub mod handlers;
pub mod password;

pub use extractors::{Admin, RequireAuth, RequireRole, RequiredRole};

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
