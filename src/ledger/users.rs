//! User persistence: lookup for login, insert at registration.

use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

/// Row returned from DB (email is stored lowercase).
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
}

/// Get a user by email (lowercase) for login.
pub async fn get_user_by_email(
    pool: &PgPool,
    email_lowercase: &str,
) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as("SELECT id, email, password_hash FROM users WHERE email = $1")
        .bind(email_lowercase)
        .fetch_optional(pool)
        .await
}

/// Insert a user. Email must already be lowercase. Runs inside the same
/// transaction that seeds the wallet.
pub async fn insert_user(
    conn: &mut PgConnection,
    id: Uuid,
    email: &str,
    password_hash: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO users (id, email, password_hash) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(email)
        .bind(password_hash)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
