use serde::Serialize;
use sqlx::{Sqlite, SqlitePool};

use crate::auth::rbac::Role;
use crate::db::{new_id, now};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: String,
    pub email_verified: bool,
    #[serde(skip_serializing)]
    pub email_verification_token: Option<String>,
    #[serde(skip_serializing)]
    pub email_verification_expires: Option<String>,
    pub last_login: Option<String>,
    pub failed_login_attempts: i64,
    pub locked_until: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn role(&self) -> Role {
        Role::parse(&self.role)
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Role::Admin
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// `now` must be a timestamp produced by [`crate::db::now`].
    pub fn is_locked(&self, now: &str) -> bool {
        self.locked_until.as_deref().is_some_and(|until| until > now)
    }
}

#[derive(Debug)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub verification_token: String,
    pub verification_expires: String,
}

/// Row returned by the admin user listing.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub is_verified: bool,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: String,
    pub last_login: Option<String>,
    pub total_students: i64,
    pub total_actions: i64,
}

pub struct UserRepository;

impl UserRepository {
    pub async fn insert<'e, E>(executor: E, user: &NewUser) -> sqlx::Result<User>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let ts = now();
        sqlx::query_as::<_, User>(
            "INSERT INTO users
                (id, email, password_hash, first_name, last_name, phone, role,
                 email_verified, email_verification_token, email_verification_expires,
                 failed_login_attempts, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, 'parent', 0, ?, ?, 0, 1, ?, ?)
             RETURNING *"
        )
        .bind(new_id())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.phone.as_deref())
        .bind(&user.verification_token)
        .bind(&user.verification_expires)
        .bind(&ts)
        .bind(&ts)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_active_by_id(pool: &SqlitePool, id: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ? AND is_active = 1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_active_by_email(pool: &SqlitePool, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ? AND is_active = 1")
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    pub async fn email_exists(pool: &SqlitePool, email: &str) -> sqlx::Result<bool> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(pool)
            .await?;
        Ok(count > 0)
    }

    /// Bumps the failure counter and locks the account once `max_attempts` is reached.
    /// Returns the updated row.
    pub async fn record_failed_login(
        pool: &SqlitePool,
        id: &str,
        max_attempts: i64,
        lock_until: &str,
    ) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(
            "UPDATE users
             SET failed_login_attempts = failed_login_attempts + 1,
                 locked_until = CASE WHEN failed_login_attempts + 1 >= ? THEN ? ELSE locked_until END,
                 updated_at = ?
             WHERE id = ?
             RETURNING *"
        )
        .bind(max_attempts)
        .bind(lock_until)
        .bind(now())
        .bind(id)
        .fetch_one(pool)
        .await
    }

    pub async fn record_successful_login(pool: &SqlitePool, id: &str) -> sqlx::Result<()> {
        let ts = now();
        sqlx::query(
            "UPDATE users
             SET failed_login_attempts = 0, locked_until = NULL, last_login = ?, updated_at = ?
             WHERE id = ?"
        )
        .bind(&ts)
        .bind(&ts)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_verification_token(
        pool: &SqlitePool,
        token: &str,
    ) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users
             WHERE email_verification_token = ?
               AND email_verification_expires > ?
               AND is_active = 1"
        )
        .bind(token)
        .bind(now())
        .fetch_optional(pool)
        .await
    }

    pub async fn mark_email_verified(pool: &SqlitePool, id: &str) -> sqlx::Result<()> {
        sqlx::query(
            "UPDATE users
             SET email_verified = 1, email_verification_token = NULL,
                 email_verification_expires = NULL, updated_at = ?
             WHERE id = ?"
        )
        .bind(now())
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn set_role(pool: &SqlitePool, id: &str, role: Role) -> sqlx::Result<()> {
        sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(now())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Deactivates the account together with every student profile it owns.
    pub async fn deactivate_with_students(pool: &SqlitePool, id: &str) -> sqlx::Result<()> {
        let ts = now();
        let mut tx = pool.begin().await?;
        sqlx::query("UPDATE users SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(&ts)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE students SET is_active = 0, updated_at = ? WHERE user_id = ?")
            .bind(&ts)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await
    }

    pub async fn list_summaries(
        pool: &SqlitePool,
        search: Option<&str>,
        skip: i64,
        limit: i64,
    ) -> sqlx::Result<Vec<UserSummary>> {
        let pattern = search.map(|s| format!("%{}%", s.to_lowercase()));
        sqlx::query_as::<_, UserSummary>(
            "SELECT u.id, u.email,
                    u.first_name || ' ' || u.last_name AS full_name,
                    u.email_verified AS is_verified,
                    (u.role = 'admin') AS is_admin,
                    u.is_active, u.created_at, u.last_login,
                    (SELECT COUNT(*) FROM students s WHERE s.user_id = u.id AND s.is_active = 1) AS total_students,
                    (SELECT COUNT(*) FROM user_actions a WHERE a.user_id = u.id) AS total_actions
             FROM users u
             WHERE u.is_active = 1
               AND (?1 IS NULL
                    OR LOWER(u.email) LIKE ?1
                    OR LOWER(u.first_name || ' ' || u.last_name) LIKE ?1)
             ORDER BY u.created_at DESC
             LIMIT ?2 OFFSET ?3"
        )
        .bind(pattern)
        .bind(limit)
        .bind(skip)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(locked_until: Option<&str>, role: &str) -> User {
        User {
            id: "u1".to_string(),
            email: "parent@example.com".to_string(),
            password_hash: String::new(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            phone: None,
            role: role.to_string(),
            email_verified: false,
            email_verification_token: None,
            email_verification_expires: None,
            last_login: None,
            failed_login_attempts: 0,
            locked_until: locked_until.map(str::to_string),
            is_active: true,
            created_at: "2024-01-01T00:00:00.000Z".to_string(),
            updated_at: "2024-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn test_lock_only_applies_until_expiry() {
        let u = user(Some("2024-06-01T12:30:00.000Z"), "parent");
        assert!(u.is_locked("2024-06-01T12:00:00.000Z"));
        assert!(!u.is_locked("2024-06-01T12:30:00.001Z"));
        assert!(!user(None, "parent").is_locked("2024-06-01T12:00:00.000Z"));
    }

    #[test]
    fn test_admin_flag_and_full_name() {
        assert!(user(None, "admin").is_admin());
        assert!(!user(None, "parent").is_admin());
        assert_eq!(user(None, "parent").full_name(), "Ada Lovelace");
    }

    #[test]
    fn test_serialization_hides_secrets() {
        let value = serde_json::to_value(user(None, "parent")).expect("serializes");
        assert!(value.get("password_hash").is_none());
        assert!(value.get("email_verification_token").is_none());
        assert_eq!(value["email"], "parent@example.com");
    }
}
