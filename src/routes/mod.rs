//! Route definitions for the identifier allocation API.

pub mod allocation;
pub mod health;
pub mod patterns;

use axum::{
    extract::{FromRequest, FromRequestParts},
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::identifier_type::IdentifierType;
use crate::AppState;

/// Prefix shared by every scoped route.
pub const SCOPE: &str = "/api/v1/organizations/{org_id}/identifier-types/{identifier_type}";

/// Request bodies are small JSON documents.
const BODY_LIMIT_BYTES: usize = 16 * 1024;

/// JSON body whose rejections are reported in the response envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Path parameters whose rejections are reported in the response envelope.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// `{org_id}/{identifier_type}` path segments. The type is matched case-insensitively.
#[derive(Debug, Deserialize)]
pub struct ScopePath {
    pub org_id: Uuid,
    pub identifier_type: String,
}

impl ScopePath {
    pub fn resolve(&self) -> Result<(Uuid, IdentifierType), AppError> {
        let identifier_type = self
            .identifier_type
            .parse::<IdentifierType>()
            .map_err(AppError::Validation)?;
        Ok((self.org_id, identifier_type))
    }
}

/// Scoped path addressing a single pattern.
#[derive(Debug, Deserialize)]
pub struct PatternPath {
    pub org_id: Uuid,
    pub identifier_type: String,
    pub pattern_id: Uuid,
}

impl PatternPath {
    pub fn resolve(&self) -> Result<(Uuid, IdentifierType, Uuid), AppError> {
        let identifier_type = self
            .identifier_type
            .parse::<IdentifierType>()
            .map_err(AppError::Validation)?;
        Ok((self.org_id, identifier_type, self.pattern_id))
    }
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let scoped = Router::new()
        .route(
            &format!("{SCOPE}/active-pattern"),
            get(allocation::active_pattern),
        )
        .route(&format!("{SCOPE}/allocations"), post(allocation::allocate))
        .route(&format!("{SCOPE}/counter"), get(patterns::counter))
        .route(
            &format!("{SCOPE}/patterns"),
            get(patterns::list).post(patterns::add),
        )
        .route(
            &format!("{SCOPE}/patterns/{{pattern_id}}/active"),
            put(patterns::set_active),
        )
        .route(
            &format!("{SCOPE}/patterns/{{pattern_id}}"),
            delete(patterns::remove),
        );

    Router::new()
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .merge(scoped)
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
