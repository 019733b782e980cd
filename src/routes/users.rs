use axum::{
    Form, Json, Router,
    extract::State,
    http::StatusCode,
    routing::post,
};
use tracing::{info, instrument};
use validator::Validate;

use crate::{
    auth::{hash_password, verify_password},
    error::{ApiError, ApiResult},
    models::{LoginForm, Token, UserCreate, UserResponse},
    repository::users,
    serving::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/", post(create_user))
        .route("/users/login", post(login))
}

#[instrument(skip_all)]
async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<UserCreate>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    payload
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let password = payload.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(anyhow::Error::from)??;
    match users::add_user(&state.pool, &payload.email, &password_hash).await {
        Ok(user) => {
            info!(event = "UserCreated", user_id = user.id, "Created user");
            Ok((StatusCode::CREATED, Json(user.into())))
        }
        Err(e) if users::is_duplicate_email(&e) => Err(ApiError::DuplicateEmail),
        Err(e) => Err(e.into()),
    }
}

#[instrument(skip_all)]
async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> ApiResult<Json<Token>> {
    let user = users::get_user_by_email(&state.pool, &form.username)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;
    let password = form.password;
    let password_hash = user.password.clone();
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
        .await
        .map_err(anyhow::Error::from)?;
    if !verified {
        return Err(ApiError::InvalidCredentials);
    }
    let access_token = state.auth.create_access_token(&user.email, None)?;
    info!(event = "UserLoggedIn", user_id = user.id, "Issued access token");
    Ok(Json(Token::bearer(access_token)))
}
