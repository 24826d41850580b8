//! Inbound webhook endpoints.
//!
//! Bodies are taken as raw bytes so the signature is checked over exactly
//! what was sent.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use osccai_common::AppResult;
use osccai_core::webhook::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use serde_json::{Value, json};

use crate::middleware::AppState;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Notifications from the consensus service.
async fn consensus(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let outcome = state
        .webhook_service
        .handle_consensus(
            header(&headers, SIGNATURE_HEADER),
            header(&headers, TIMESTAMP_HEADER),
            &body,
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "constitutionId": outcome.constitution_id,
    })))
}

/// Score writeback from the scoring service.
async fn scores(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let updated = state
        .webhook_service
        .handle_scores(
            header(&headers, SIGNATURE_HEADER),
            header(&headers, TIMESTAMP_HEADER),
            &body,
        )
        .await?;

    Ok(Json(json!({ "success": true, "updated": updated })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/consensus", post(consensus))
        .route("/scores", post(scores))
}
