//! Consumer-facing routes: read the active pattern and allocate identifiers.

use axum::{extract::State, Json};

use crate::errors::{ApiResponse, AppError};
use crate::models::allocation::AllocationResult;
use crate::models::pattern::Pattern;
use crate::routes::{ApiPath, ScopePath};
use crate::AppState;

/// GET {scope}/active-pattern: the pattern allocations currently use.
pub async fn active_pattern(
    State(state): State<AppState>,
    ApiPath(path): ApiPath<ScopePath>,
) -> Result<Json<ApiResponse<Pattern>>, AppError> {
    let (org_id, identifier_type) = path.resolve()?;
    let pattern = state
        .allocator
        .get_active_pattern(org_id, identifier_type)
        .await?;
    Ok(ApiResponse::success(pattern))
}

/// POST {scope}/allocations: issue the next identifier.
pub async fn allocate(
    State(state): State<AppState>,
    ApiPath(path): ApiPath<ScopePath>,
) -> Result<Json<ApiResponse<AllocationResult>>, AppError> {
    let (org_id, identifier_type) = path.resolve()?;
    let result = state.allocator.allocate_next(org_id, identifier_type).await?;
    Ok(ApiResponse::success(result))
}
