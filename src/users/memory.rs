use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repo::UserRepo;
use super::repo_types::{NewUser, RoleUpdate, User, ADMIN_ROLE};

/// Process-local user store. Registration order is insertion order.
#[derive(Default)]
pub struct MemoryUserRepo {
    users: RwLock<Vec<User>>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn create(&self, new_user: NewUser) -> anyhow::Result<Option<User>> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.username == new_user.username) {
            return Ok(None);
        }
        let roles = if users.is_empty() {
            vec![ADMIN_ROLE.to_string()]
        } else {
            Vec::new()
        };
        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username,
            firstname: new_user.firstname,
            lastname: new_user.lastname,
            email: new_user.email,
            password_hash: new_user.password_hash,
            roles,
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(Some(user))
    }

    async fn add_role(&self, username: &str, role: &str) -> anyhow::Result<RoleUpdate> {
        let mut users = self.users.write().await;
        let Some(user) = users.iter_mut().find(|u| u.username == username) else {
            return Ok(RoleUpdate::NoSuchUser);
        };
        if user.has_role(role) {
            return Ok(RoleUpdate::Unchanged);
        }
        user.roles.push(role.to_string());
        Ok(RoleUpdate::Updated(user.roles.clone()))
    }

    async fn remove_role(&self, username: &str, role: &str) -> anyhow::Result<RoleUpdate> {
        let mut users = self.users.write().await;
        let Some(user) = users.iter_mut().find(|u| u.username == username) else {
            return Ok(RoleUpdate::NoSuchUser);
        };
        if !user.has_role(role) {
            return Ok(RoleUpdate::Unchanged);
        }
        user.roles.retain(|r| r != role);
        Ok(RoleUpdate::Updated(user.roles.clone()))
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        Ok(self.users.read().await.clone())
    }
}
