use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;
use crate::config::Config;
use std::str::FromStr;

pub mod models;
pub mod analytics;

pub type DbPool = SqlitePool;

/// Timestamp format stored in every TEXT time column.
/// Fixed-width UTC with milliseconds, so string order equals time order.
pub fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now() -> String {
    timestamp(Utc::now())
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub async fn init(cfg: &Config) -> Result<DbPool> {
    let db_url = format!("sqlite://{}?mode=rwc", cfg.database.path);

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(20)
        .connect_with(
            sqlx::sqlite::SqliteConnectOptions::from_str(&db_url)?
                .create_if_missing(true)
                .foreign_keys(true)
        )
        .await?;

    sqlx::migrate!("./src/db/migrations").run(&pool).await?;

    sqlx::query("PRAGMA journal_mode=WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA synchronous=NORMAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA cache_size=-64000")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA wal_autocheckpoint=1000")
        .execute(&pool)
        .await?;

    tracing::info!("Database connected: {}", cfg.database.path);
    Ok(pool)
}

/// Create the configured admin account when a seed password is set and the
/// email is not registered yet. An existing account is promoted to admin.
pub async fn seed_admin(pool: &DbPool, cfg: &Config) -> Result<()> {
    let Some(password) = cfg.seed.admin_password.as_deref() else {
        return Ok(());
    };
    let email = cfg.seed.admin_email.to_lowercase();

    let existing: Option<(String, String)> =
        sqlx::query_as("SELECT id, role FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(pool)
            .await?;

    match existing {
        Some((_, role)) if role == "admin" => {}
        Some((id, _)) => {
            sqlx::query("UPDATE users SET role = 'admin', updated_at = ? WHERE id = ?")
                .bind(now())
                .bind(&id)
                .execute(pool)
                .await?;
            tracing::info!("Promoted existing account {} to admin", email);
        }
        None => {
            let ts = now();
            let password_hash = crate::auth::password::hash(password)?;
            sqlx::query(
                "INSERT INTO users (id, email, password_hash, first_name, last_name, role,
                                    email_verified, is_active, created_at, updated_at)
                 VALUES (?, ?, ?, 'CIFIX', 'Administrator', 'admin', 1, 1, ?, ?)"
            )
            .bind(new_id())
            .bind(&email)
            .bind(&password_hash)
            .bind(&ts)
            .bind(&ts)
            .execute(pool)
            .await?;
            tracing::warn!("Created seed admin account {}. Rotate the seed password after first login.", email);
        }
    }

    Ok(())
}
