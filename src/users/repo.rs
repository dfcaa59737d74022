use async_trait::async_trait;
use sqlx::PgPool;

use super::repo_types::{NewUser, RoleUpdate, User, ADMIN_ROLE};

/// Persistence for the user collection.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;

    /// Inserts a user. Returns `None` when the username is taken.
    /// The first user ever stored is granted [`ADMIN_ROLE`].
    async fn create(&self, new_user: NewUser) -> anyhow::Result<Option<User>>;

    async fn add_role(&self, username: &str, role: &str) -> anyhow::Result<RoleUpdate>;

    async fn remove_role(&self, username: &str, role: &str) -> anyhow::Result<RoleUpdate>;

    /// All users in registration order.
    async fn list(&self) -> anyhow::Result<Vec<User>>;
}

const USER_COLUMNS: &str =
    "id, username, firstname, lastname, email, password_hash, roles, created_at";

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn exists(&self, username: &str) -> anyhow::Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE username = $1)")
                .bind(username)
                .fetch_one(&self.db)
                .await?;
        Ok(exists)
    }

    async fn role_update(
        &self,
        username: &str,
        updated: Option<Vec<String>>,
    ) -> anyhow::Result<RoleUpdate> {
        match updated {
            Some(roles) => Ok(RoleUpdate::Updated(roles)),
            None if self.exists(username).await? => Ok(RoleUpdate::Unchanged),
            None => Ok(RoleUpdate::NoSuchUser),
        }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, new_user: NewUser) -> anyhow::Result<Option<User>> {
        let mut tx = self.db.begin().await?;

        // Serializes concurrent registrations so only one can see an empty table.
        sqlx::query("LOCK TABLE users IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, firstname, lastname, email, password_hash, roles)
            SELECT $1, $2, $3, $4, $5,
                   CASE WHEN EXISTS (SELECT 1 FROM users)
                        THEN ARRAY[]::TEXT[]
                        ELSE ARRAY[$6]::TEXT[]
                   END
            ON CONFLICT (username) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new_user.username)
        .bind(&new_user.firstname)
        .bind(&new_user.lastname)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(ADMIN_ROLE)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(user)
    }

    async fn add_role(&self, username: &str, role: &str) -> anyhow::Result<RoleUpdate> {
        let updated: Option<Vec<String>> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET roles = array_append(roles, $2)
            WHERE username = $1 AND NOT ($2 = ANY (roles))
            RETURNING roles
            "#,
        )
        .bind(username)
        .bind(role)
        .fetch_optional(&self.db)
        .await?;
        self.role_update(username, updated).await
    }

    async fn remove_role(&self, username: &str, role: &str) -> anyhow::Result<RoleUpdate> {
        let updated: Option<Vec<String>> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET roles = array_remove(roles, $2)
            WHERE username = $1 AND $2 = ANY (roles)
            RETURNING roles
            "#,
        )
        .bind(username)
        .bind(role)
        .fetch_optional(&self.db)
        .await?;
        self.role_update(username, updated).await
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at, username"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }
}
