//! Startup seeding.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

use super::User;

/// Ensure an admin account exists. Identity issuance happens at the external
/// auth provider; this only guarantees the corresponding user row so the
/// gateway-supplied admin id resolves.
pub async fn ensure_admin_user(pool: &SqlitePool, email: &str, name: &str) -> Result<()> {
    let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    if let Some(user) = existing {
        if user.role != "ADMIN" {
            sqlx::query("UPDATE users SET role = 'ADMIN', updated_at = ? WHERE id = ?")
                .bind(chrono::Utc::now().to_rfc3339())
                .bind(&user.id)
                .execute(pool)
                .await?;
            info!(email = email, "Promoted existing user to admin");
        }
        return Ok(());
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO users (id, name, email, role, status, created_at, updated_at)
         VALUES (?, ?, ?, 'ADMIN', 'ACTIVE', ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(email)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    info!(email = email, "Seeded admin user");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing;

    #[tokio::test]
    async fn test_seed_creates_admin_once() {
        let pool = testing::pool().await;
        ensure_admin_user(&pool, "admin@skillbridge.test", "Admin")
            .await
            .unwrap();
        ensure_admin_user(&pool, "admin@skillbridge.test", "Admin")
            .await
            .unwrap();

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = 'admin@skillbridge.test'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_seed_promotes_existing_user() {
        let pool = testing::pool().await;
        let id = testing::insert_user(&pool, "STUDENT").await;
        let email: String = sqlx::query_scalar("SELECT email FROM users WHERE id = ?")
            .bind(&id)
            .fetch_one(&pool)
            .await
            .unwrap();

        ensure_admin_user(&pool, &email, "whoever").await.unwrap();

        let role: String = sqlx::query_scalar("SELECT role FROM users WHERE id = ?")
            .bind(&id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(role, "ADMIN");
    }
}
