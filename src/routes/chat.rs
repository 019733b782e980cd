use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::{
    auth::CurrentUser,
    chain::RagChain,
    error::{ApiError, ApiResult},
    models::{Chat, ChatHistory, MessageCreate, NewChat, Role, User},
    repository::{chats, documents},
    serving::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat/message", post(post_message))
        .route("/chat", post(create_chat))
        .route("/chat/", post(create_chat))
        .route(
            "/chat/{chat_id}",
            get(get_chat).put(rename_chat).delete(delete_chat),
        )
        .route("/chat/document/{document_id}", get(get_chats_by_document))
        .route("/chat/history/{chat_id}", get(get_chat_history))
}

#[derive(Debug, Deserialize)]
struct CreateChatParams {
    document_id: i64,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RenameParams {
    name: String,
}

async fn owned_chat(state: &AppState, user: &User, chat_id: i64) -> ApiResult<Chat> {
    chats::get_user_chat(&state.pool, user.id, chat_id)
        .await?
        .ok_or_else(ApiError::chat_not_found)
}

#[instrument(skip_all)]
async fn post_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(message): Json<MessageCreate>,
) -> ApiResult<Json<String>> {
    let chat = owned_chat(&state, &user, message.chat_id).await?;
    if message.content.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Message content must not be empty.".to_string(),
        ));
    }
    if message.role.is_some_and(|role| role != Role::Human) {
        debug!(chat_id = chat.id, "Ignoring client-supplied role {:?}", message.role);
    }
    let history = chats::load_chat_history(&state.pool, chat.id).await?;
    chats::save_message(&state.pool, chat.id, Role::Human, &message.content).await?;

    let chain = RagChain::new(
        state.llm.as_ref(),
        state.retriever.as_ref(),
        chat.document_id,
        state.retrieval_k,
    );
    let answer = chain.invoke(&message.content, &history).await?;
    chats::save_message(&state.pool, chat.id, Role::Ai, &answer).await?;
    info!(event = "ChatAnswered", chat_id = chat.id, turns = history.len() + 2, "Answered message");
    Ok(Json(answer))
}

#[instrument(skip_all)]
async fn create_chat(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<CreateChatParams>,
) -> ApiResult<Json<Chat>> {
    let document = documents::get_user_document(&state.pool, user.id, params.document_id)
        .await?
        .ok_or_else(ApiError::document_not_found)?;
    let chat = chats::create_chat(
        &state.pool,
        &NewChat {
            name: params.name,
            document_id: document.id,
            user_id: user.id,
        },
    )
    .await?;
    info!(event = "ChatCreated", chat_id = chat.id, document_id = document.id, "Created chat");
    Ok(Json(chat))
}

#[instrument(skip_all)]
async fn get_chat(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(chat_id): Path<i64>,
) -> ApiResult<Json<Chat>> {
    Ok(Json(owned_chat(&state, &user, chat_id).await?))
}

#[instrument(skip_all)]
async fn get_chats_by_document(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(document_id): Path<i64>,
) -> ApiResult<Json<Vec<Chat>>> {
    documents::get_user_document(&state.pool, user.id, document_id)
        .await?
        .ok_or_else(ApiError::document_not_found)?;
    let document_chats = chats::get_chats_by_document_id(&state.pool, document_id).await?;
    Ok(Json(document_chats))
}

#[instrument(skip_all)]
async fn get_chat_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(chat_id): Path<i64>,
) -> ApiResult<Json<ChatHistory>> {
    let chat = owned_chat(&state, &user, chat_id).await?;
    let messages = chats::load_chat_history(&state.pool, chat.id).await?;
    Ok(Json(ChatHistory { messages }))
}

#[instrument(skip_all)]
async fn rename_chat(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(chat_id): Path<i64>,
    Query(params): Query<RenameParams>,
) -> ApiResult<Json<Chat>> {
    let chat = owned_chat(&state, &user, chat_id).await?;
    let renamed = chats::rename_chat(&state.pool, chat.id, &params.name)
        .await?
        .ok_or_else(ApiError::chat_not_found)?;
    Ok(Json(renamed))
}

#[instrument(skip_all)]
async fn delete_chat(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(chat_id): Path<i64>,
) -> ApiResult<Json<()>> {
    let chat = owned_chat(&state, &user, chat_id).await?;
    chats::delete_chat(&state.pool, chat.id).await?;
    info!(event = "ChatDeleted", chat_id = chat.id, "Deleted chat");
    Ok(Json(()))
}
