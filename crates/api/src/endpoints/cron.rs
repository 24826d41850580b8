//! Cron trigger for the batch score recalculation.

use axum::{Json, Router, extract::State, routing::get};
use osccai_common::{AppError, AppResult};
use serde::Serialize;
use tracing::info;

use crate::{
    extractors::Caller,
    middleware::{AppState, Credential},
};

#[derive(Serialize)]
pub struct CronResponse {
    pub success: bool,
    pub message: String,
    pub succeeded: usize,
    pub failed: usize,
}

/// Open when no cron secret is configured; otherwise the auth middleware
/// must have recognised the secret or the admin token.
fn authorize(state: &AppState, caller: &Caller) -> AppResult<()> {
    if state.cron_secret.as_deref().is_none_or(str::is_empty) {
        return Ok(());
    }
    match caller.credential {
        Credential::Cron | Credential::Admin => Ok(()),
        _ => Err(AppError::Unauthorized("Unauthorized".to_string())),
    }
}

/// Recalculate scores for every published poll.
async fn update_scores(
    caller: Caller,
    State(state): State<AppState>,
) -> AppResult<Json<CronResponse>> {
    authorize(&state, &caller)?;

    info!("Cron score recalculation started");
    let report = state.scoring_service.recalculate_all(false).await?;

    Ok(Json(CronResponse {
        success: true,
        message: format!(
            "Recalculation requested for {} of {} polls",
            report.succeeded, report.attempted
        ),
        succeeded: report.succeeded,
        failed: report.failures.len(),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/update-gac-scores", get(update_scores))
}
