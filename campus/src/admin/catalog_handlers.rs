use axum::{extract::State, http::StatusCode, response::Json};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sea_orm::{EntityTrait, QueryOrder};

use crate::admin::dto::*;
use crate::admin::jwt::{AuthClaims, SuperAdminClaims};
use crate::admin::{ApiErr, AppState};
use crate::catalog::{CatalogService, EbookIngest, EbookUpload};
use crate::entity::board;

pub async fn list_boards(
    _claims: AuthClaims,
    State(state): State<AppState>,
) -> Result<Json<Vec<BoardResponse>>, ApiErr> {
    let boards = board::Entity::find()
        .order_by_asc(board::Column::Id)
        .all(&state.db)
        .await
        .map_err(ApiErr::internal)?;
    Ok(Json(boards.into_iter().map(Into::into).collect()))
}

// ---------- POST /catalog/ebooks ----------

pub async fn upload_ebook(
    SuperAdminClaims(claims): SuperAdminClaims,
    State(state): State<AppState>,
    Json(body): Json<UploadEbookRequest>,
) -> Result<(StatusCode, Json<EbookIngest>), ApiErr> {
    let content = STANDARD
        .decode(body.content.as_bytes())
        .map_err(|e| ApiErr::unprocessable(format!("content is not valid base64: {e}")))?;

    let service = CatalogService::new(&state.db, &*state.object_store, &*state.extractor);
    let ingest = service
        .upload_ebook(EbookUpload {
            board_id: body.board_id,
            class_id: body.class_id,
            subject_id: body.subject_id,
            upload_type: body.upload_type,
            chapter_number: body.chapter_number,
            content,
        })
        .await?;

    tracing::info!(
        user = %claims.username,
        ebook_id = ingest.ebook_id,
        "ebook uploaded"
    );
    Ok((StatusCode::CREATED, Json(ingest)))
}
