//! AI search endpoint.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};

use seon_service::error::ErrorKind;
use seon_service::search::SearchService;
use seon_service::types::{SearchOutcome, SearchRequest};

use crate::error::{ApiError, ErrorBody};
use crate::identity::ClientIdentity;
use crate::state::AppState;

/// Select the documentation files relevant to a query.
///
/// The query is screened, rate limited per client and checked against the
/// client's recent queries before the AI is consulted. Identical searches
/// are answered from the result cache.
#[utoipa::path(
    post,
    path = "/api/ai-search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Files selected", body = SearchOutcome),
        (status = 400, description = "Invalid query or candidate files", body = ErrorBody),
        (status = 403, description = "Verification failed", body = ErrorBody),
        (status = 429, description = "Rate limited or duplicate query", body = ErrorBody),
        (status = 500, description = "Internal error", body = ErrorBody),
        (status = 503, description = "AI service unavailable", body = ErrorBody),
    ),
    tag = "Search"
)]
pub async fn ai_search(
    State(state): State<AppState>,
    ClientIdentity(client): ClientIdentity,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchOutcome>, ApiError> {
    let Json(req) = body.map_err(|rejection| {
        state.metrics().record_rejection(ErrorKind::Validation);
        tracing::debug!(%client, error = %rejection.body_text(), "unreadable search body");
        ApiError::InvalidBody(rejection.body_text())
    })?;

    let outcome = SearchService::search(state.service(), &client, req).await?;
    Ok(Json(outcome))
}
