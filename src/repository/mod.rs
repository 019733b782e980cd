//! Postgres persistence for users, documents, chats and messages.

pub mod chats;
pub mod documents;
pub mod users;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::DatabaseArgs;

pub async fn create_pool(config: &DatabaseArgs) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    Ok(pool)
}

pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
    Ok(())
}

/// Connects to `DATABASE_URL` and migrates it, or returns `None` when the
/// variable is not set so that database tests can be skipped.
#[cfg(test)]
pub(crate) async fn test_pool() -> Option<PgPool> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(s) => s,
        Err(_) => {
            println!("Skipping test because Postgres is not available");
            return None;
        }
    };
    let pool = PgPool::connect(&url)
        .await
        .expect("Should be able to connect to DATABASE_URL");
    migrate(&pool).await.expect("Should be able to run migrations");
    Some(pool)
}

/// Creates a user with a unique email for database tests.
#[cfg(test)]
pub(crate) async fn test_user(pool: &PgPool) -> crate::models::User {
    let email = format!("{}@test.pdfchat.xyz", uuid::Uuid::new_v4());
    users::add_user(pool, &email, "not-a-real-hash").await.unwrap()
}
