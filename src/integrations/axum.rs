//! Axum router for the manual trial endpoint.
//!
//! `POST /api/licensing/trial` runs the trial hook and always answers
//! `200 OK` with `{"status":0}` or `{"status":1}`.

use crate::hooks::{Licensing, TemplateCounter, TrialResponse};
use ::axum::{extract::State, response::Json, routing::post, Router};
use std::sync::Arc;

/// Path of the trial endpoint.
pub const TRIAL_PATH: &str = "/api/licensing/trial";

async fn trial_handler<C: TemplateCounter>(
    State(licensing): State<Arc<Licensing<C>>>,
) -> Json<TrialResponse> {
    Json(licensing.start_trial().await)
}

/// Build the licensing router; merge it into the host's router.
pub fn trial_router<C: TemplateCounter>(licensing: Arc<Licensing<C>>) -> Router {
    Router::new()
        .route(TRIAL_PATH, post(trial_handler::<C>))
        .with_state(licensing)
}
