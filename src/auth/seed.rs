use uuid::Uuid;

use crate::auth::hash_password;
use crate::db::Db;

/// Seeds the admin account (username: "admin").
/// Safe to call on every startup — existence is checked before inserting.
pub async fn seed_accounts(pool: &Db) -> anyhow::Result<()> {
    seed_admin(pool).await?;

    Ok(())
}

async fn seed_admin(pool: &Db) -> anyhow::Result<()> {
    const ADMIN_USERNAME: &str = "admin";
    const ADMIN_EMAIL: &str = "admin@glowdesk.local";
    const ADMIN_PASSWORD: &str = "admin";

    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ? AND role = 'admin')",
    )
    .bind(ADMIN_USERNAME)
    .fetch_one(pool)
    .await?;

    if exists {
        return Ok(());
    }

    let hash = hash_password(ADMIN_PASSWORD)?;
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO users (id, username, email, password_hash, role, is_active, created_at, updated_at)
         VALUES (?, ?, ?, ?, 'admin', 1, UTC_TIMESTAMP(), UTC_TIMESTAMP())",
    )
    .bind(id)
    .bind(ADMIN_USERNAME)
    .bind(ADMIN_EMAIL)
    .bind(hash)
    .execute(pool)
    .await?;
    tracing::info!("Seeded admin account (username: admin)");

    Ok(())
}
