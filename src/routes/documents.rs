use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State, multipart::MultipartError},
    routing::{delete, get, post},
};
use axum::body::Bytes;
use serde_json::{Value, json};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::CurrentUser,
    error::{ApiError, ApiResult},
    models::{Document, NewDocument},
    repository::documents,
    serving::AppState,
};

const PDF_CONTENT_TYPE: &str = "application/pdf";

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/documents/upload",
            post(upload_file).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/documents", get(get_documents))
        .route("/documents/", get(get_documents))
        .route("/documents/{document_id}", delete(delete_document_by_id))
}

struct Upload {
    file_name: String,
    content: Bytes,
}

fn check_content_type(content_type: Option<&str>) -> ApiResult<()> {
    match content_type {
        Some(PDF_CONTENT_TYPE) => Ok(()),
        other => {
            warn!(content_type = ?other, "Rejected upload");
            Err(ApiError::BadRequest("Only PDF files are allowed.".to_string()))
        }
    }
}

fn multipart_error(e: MultipartError) -> ApiError {
    ApiError::BadRequest(e.body_text())
}

async fn read_upload(multipart: &mut Multipart) -> ApiResult<Upload> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        check_content_type(field.content_type())?;
        let file_name = field.file_name().unwrap_or("document.pdf").to_string();
        let content = field.bytes().await.map_err(multipart_error)?;
        return Ok(Upload { file_name, content });
    }
    Err(ApiError::BadRequest("Missing form field 'file'.".to_string()))
}

#[instrument(skip_all)]
async fn upload_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> ApiResult<Json<Document>> {
    let upload = read_upload(&mut multipart).await?;
    let path = state.storage.save_pdf(&upload.content).await?;
    let new_document = NewDocument {
        name: upload.file_name,
        file_path: path.to_string_lossy().into_owned(),
        user_id: user.id,
    };
    let document = match documents::save_document(&state.pool, &new_document).await {
        Ok(d) => d,
        Err(e) => {
            if let Err(cleanup) = state.storage.remove(&path).await {
                warn!(path = %path.display(), "Could not remove stored file: {:#}", cleanup);
            }
            return Err(e.into());
        }
    };
    info!(event = "DocumentUploaded", document_id = document.id, "Stored document {}", document.name);

    // TODO: move ingestion to a background job queue so large uploads return immediately
    if let Err(e) = state.pipeline.run(document.id, &path).await {
        error!(event = "IngestionFailed", document_id = document.id, "{:#}", e);
        discard_failed_upload(&state, document.id, &path).await;
        return Err(ApiError::Internal(e));
    }
    Ok(Json(document))
}

/// Removes every trace of a document whose ingestion failed. Each step runs
/// even when an earlier one fails.
async fn discard_failed_upload(state: &AppState, document_id: i64, path: &std::path::Path) {
    if let Err(e) = documents::delete_document(&state.pool, document_id).await {
        warn!(document_id, "Could not remove document row: {}", e);
    }
    if let Err(e) = state.storage.remove(path).await {
        warn!(document_id, "Could not remove stored file: {:#}", e);
    }
    if let Err(e) = state.vectordb.delete_document(document_id).await {
        warn!(document_id, "Could not remove partial vectors: {:#}", e);
    }
}

#[instrument(skip_all)]
async fn get_documents(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Vec<Document>>> {
    let documents = documents::get_users_documents(&state.pool, user.id).await?;
    Ok(Json(documents))
}

#[instrument(skip_all)]
async fn delete_document_by_id(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(document_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let document = documents::get_user_document(&state.pool, user.id, document_id)
        .await?
        .ok_or_else(ApiError::document_not_found)?;
    // the row must outlive the vectors
    state.vectordb.delete_document(document.id).await?;
    documents::delete_document(&state.pool, document.id).await?;
    if let Err(e) = state
        .storage
        .remove(std::path::Path::new(&document.file_path))
        .await
    {
        warn!(document_id, "Could not remove stored file: {:#}", e);
    }
    info!(event = "DocumentDeleted", document_id, "Deleted document");
    Ok(Json(json!({"message": "Document deleted successfully."})))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_only_pdf_content_type_is_accepted() {
        assert!(check_content_type(Some("application/pdf")).is_ok());
        for other in [Some("text/plain"), Some("application/octet-stream"), None] {
            match check_content_type(other) {
                Err(ApiError::BadRequest(detail)) => assert_eq!(detail, "Only PDF files are allowed."),
                _ => panic!("{:?} should have been rejected", other),
            }
        }
    }
}
