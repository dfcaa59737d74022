use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Role granted to the first account ever registered.
pub const ADMIN_ROLE: &str = "admin";

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, never exposed
    pub roles: Vec<String>,
    pub created_at: OffsetDateTime,
}

impl User {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Fields supplied at registration.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub password_hash: String,
}

/// Outcome of adding or removing a single role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleUpdate {
    /// The role list changed; holds the new list.
    Updated(Vec<String>),
    /// Already present on add, absent on remove.
    Unchanged,
    NoSuchUser,
}
