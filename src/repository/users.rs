use sqlx::PgPool;

use crate::models::User;

pub async fn add_user(pool: &PgPool, email: &str, password_hash: &str) -> sqlx::Result<User> {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (email, password) VALUES ($1, $2) RETURNING id, email, password",
    )
    .bind(email)
    .bind(password_hash)
    .fetch_one(pool)
    .await
}

pub async fn get_user_by_email(pool: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT id, email, password FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
}

/// True when `err` is the unique-constraint violation raised for a taken email.
pub fn is_duplicate_email(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::repository::test_pool;

    #[tokio::test]
    async fn test_add_and_find_user() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let email = format!("{}@test.pdfchat.xyz", uuid::Uuid::new_v4());
        let user = add_user(&pool, &email, "hash").await.unwrap();
        let found = get_user_by_email(&pool, &email).await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.password, "hash");

        let duplicate = add_user(&pool, &email, "other").await.unwrap_err();
        assert!(is_duplicate_email(&duplicate));

        assert!(
            get_user_by_email(&pool, "nobody@test.pdfchat.xyz")
                .await
                .unwrap()
                .is_none()
        );
    }
}
