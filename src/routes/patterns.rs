//! Pattern administration routes and the counter snapshot.

use axum::{extract::State, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::{ApiResponse, AppError};
use crate::models::allocation::CounterSnapshot;
use crate::models::pattern::{AddPatternRequest, Pattern};
use crate::routes::{ApiPath, JsonBody, PatternPath, ScopePath};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct DeletedPattern {
    pub id: Uuid,
    pub deleted: bool,
}

/// GET {scope}/patterns: all patterns of the type, oldest first.
pub async fn list(
    State(state): State<AppState>,
    ApiPath(path): ApiPath<ScopePath>,
) -> Result<Json<ApiResponse<Vec<Pattern>>>, AppError> {
    let (org_id, identifier_type) = path.resolve()?;
    let patterns = state.patterns().list_by_type(org_id, identifier_type).await?;
    Ok(ApiResponse::success(patterns))
}

/// POST {scope}/patterns: register a pattern, optionally activating it.
pub async fn add(
    State(state): State<AppState>,
    ApiPath(path): ApiPath<ScopePath>,
    JsonBody(body): JsonBody<AddPatternRequest>,
) -> Result<Json<ApiResponse<Pattern>>, AppError> {
    let (org_id, identifier_type) = path.resolve()?;
    let pattern = state
        .patterns()
        .add_pattern(org_id, identifier_type, &body)
        .await?;
    Ok(ApiResponse::success(pattern))
}

/// PUT {scope}/patterns/{pattern_id}/active: swap the active pattern.
pub async fn set_active(
    State(state): State<AppState>,
    ApiPath(path): ApiPath<PatternPath>,
) -> Result<Json<ApiResponse<Pattern>>, AppError> {
    let (org_id, identifier_type, pattern_id) = path.resolve()?;
    let pattern = state
        .patterns()
        .set_active(org_id, identifier_type, pattern_id)
        .await?;
    Ok(ApiResponse::success(pattern))
}

/// DELETE {scope}/patterns/{pattern_id}: remove an inactive pattern.
pub async fn remove(
    State(state): State<AppState>,
    ApiPath(path): ApiPath<PatternPath>,
) -> Result<Json<ApiResponse<DeletedPattern>>, AppError> {
    let (org_id, identifier_type, pattern_id) = path.resolve()?;
    state
        .patterns()
        .delete(org_id, identifier_type, pattern_id)
        .await?;
    Ok(ApiResponse::success(DeletedPattern {
        id: pattern_id,
        deleted: true,
    }))
}

/// GET {scope}/counter: current counter value without advancing it.
pub async fn counter(
    State(state): State<AppState>,
    ApiPath(path): ApiPath<ScopePath>,
) -> Result<Json<ApiResponse<CounterSnapshot>>, AppError> {
    let (org_id, identifier_type) = path.resolve()?;
    let snapshot = state
        .allocator
        .current_sequence(org_id, identifier_type)
        .await?;
    Ok(ApiResponse::success(snapshot))
}
