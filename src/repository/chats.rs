use sqlx::PgPool;

use crate::models::{Chat, HistoryMessage, Message, NewChat, Role};

pub async fn create_chat(pool: &PgPool, chat: &NewChat) -> sqlx::Result<Chat> {
    sqlx::query_as::<_, Chat>(
        "INSERT INTO chats (name, document_id, user_id) VALUES ($1, $2, $3) \
         RETURNING id, name, document_id, user_id, start_time",
    )
    .bind(&chat.name)
    .bind(chat.document_id)
    .bind(chat.user_id)
    .fetch_one(pool)
    .await
}

#[cfg(test)]
pub async fn get_chat_by_id(pool: &PgPool, chat_id: i64) -> sqlx::Result<Option<Chat>> {
    sqlx::query_as::<_, Chat>(
        "SELECT id, name, document_id, user_id, start_time FROM chats WHERE id = $1",
    )
    .bind(chat_id)
    .fetch_optional(pool)
    .await
}

/// Returns the chat only when it belongs to `user_id`.
pub async fn get_user_chat(pool: &PgPool, user_id: i64, chat_id: i64) -> sqlx::Result<Option<Chat>> {
    sqlx::query_as::<_, Chat>(
        "SELECT id, name, document_id, user_id, start_time FROM chats WHERE id = $1 AND user_id = $2",
    )
    .bind(chat_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn get_chats_by_document_id(pool: &PgPool, document_id: i64) -> sqlx::Result<Vec<Chat>> {
    sqlx::query_as::<_, Chat>(
        "SELECT id, name, document_id, user_id, start_time FROM chats \
         WHERE document_id = $1 ORDER BY id",
    )
    .bind(document_id)
    .fetch_all(pool)
    .await
}

pub async fn rename_chat(pool: &PgPool, chat_id: i64, name: &str) -> sqlx::Result<Option<Chat>> {
    sqlx::query_as::<_, Chat>(
        "UPDATE chats SET name = $2 WHERE id = $1 \
         RETURNING id, name, document_id, user_id, start_time",
    )
    .bind(chat_id)
    .bind(name)
    .fetch_optional(pool)
    .await
}

/// Deletes the chat and its messages. Returns whether a row was removed.
pub async fn delete_chat(pool: &PgPool, chat_id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM chats WHERE id = $1")
        .bind(chat_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Appends a message to a chat. Fails when the chat does not exist.
pub async fn save_message(
    pool: &PgPool,
    chat_id: i64,
    role: Role,
    content: &str,
) -> anyhow::Result<Message> {
    let message = sqlx::query_as::<_, Message>(
        "INSERT INTO messages (chat_id, role, content) \
         SELECT id, $2::message_role, $3 FROM chats WHERE id = $1 \
         RETURNING id, chat_id, role, content, timestamp",
    )
    .bind(chat_id)
    .bind(role)
    .bind(content)
    .fetch_optional(pool)
    .await?;
    message.ok_or_else(|| anyhow::anyhow!("Chat with id {} not found", chat_id))
}

/// Replays the conversation of a chat, oldest message first.
pub async fn load_chat_history(pool: &PgPool, chat_id: i64) -> sqlx::Result<Vec<HistoryMessage>> {
    sqlx::query_as::<_, HistoryMessage>(
        "SELECT role, content FROM messages WHERE chat_id = $1 ORDER BY id",
    )
    .bind(chat_id)
    .fetch_all(pool)
    .await
}
