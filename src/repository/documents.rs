use sqlx::PgPool;

use crate::models::{Document, NewDocument};

pub async fn save_document(pool: &PgPool, document: &NewDocument) -> sqlx::Result<Document> {
    sqlx::query_as::<_, Document>(
        "INSERT INTO documents (name, file_path, user_id) VALUES ($1, $2, $3) RETURNING id, name, upload_time, file_path, user_id",
    )
    .bind(&document.name)
    .bind(&document.file_path)
    .bind(document.user_id)
    .fetch_one(pool)
    .await
}

pub async fn get_users_documents(pool: &PgPool, user_id: i64) -> sqlx::Result<Vec<Document>> {
    sqlx::query_as::<_, Document>(
        "SELECT id, name, upload_time, file_path, user_id FROM documents WHERE user_id = $1 ORDER BY id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Returns the document only when it belongs to `user_id`.
pub async fn get_user_document(
    pool: &PgPool,
    user_id: i64,
    document_id: i64,
) -> sqlx::Result<Option<Document>> {
    sqlx::query_as::<_, Document>(
        "SELECT id, name, upload_time, file_path, user_id FROM documents WHERE id = $1 AND user_id = $2",
    )
    .bind(document_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Deletes the row, cascading to its chats and their messages.
/// Returns the deleted document, if there was one.
pub async fn delete_document(pool: &PgPool, document_id: i64) -> sqlx::Result<Option<Document>> {
    sqlx::query_as::<_, Document>(
        "DELETE FROM documents WHERE id = $1 RETURNING id, name, upload_time, file_path, user_id",
    )
    .bind(document_id)
    .fetch_optional(pool)
    .await
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::repository::{test_pool, test_user};

    #[tokio::test]
    async fn test_documents_are_scoped_to_their_owner() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let owner = test_user(&pool).await;
        let stranger = test_user(&pool).await;
        let doc = save_document(
            &pool,
            &NewDocument {
                name: "paper.pdf".to_string(),
                file_path: "storage/paper.pdf".to_string(),
                user_id: owner.id,
            },
        )
        .await
        .unwrap();
        assert_eq!(doc.name, "paper.pdf");

        let listed = get_users_documents(&pool, owner.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(get_users_documents(&pool, stranger.id).await.unwrap().is_empty());

        assert!(get_user_document(&pool, owner.id, doc.id).await.unwrap().is_some());
        assert!(get_user_document(&pool, stranger.id, doc.id).await.unwrap().is_none());

        let deleted = delete_document(&pool, doc.id).await.unwrap().unwrap();
        assert_eq!(deleted.file_path, "storage/paper.pdf");
        assert!(delete_document(&pool, doc.id).await.unwrap().is_none());
    }
}
