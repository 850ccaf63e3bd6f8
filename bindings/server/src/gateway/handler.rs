use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, error, instrument};

use facematch::VerificationPayload;

use crate::gateway::error::{status_for, GatewayError};
use crate::gateway::state::AppState;

/// `POST /verify`: run one document/selfie comparison.
///
/// The pipeline is CPU-bound, so it runs on the blocking pool. The response
/// body is always a verification envelope.
#[instrument(skip(state, payload))]
pub async fn verify_handler(
    State(state): State<AppState>,
    payload: Result<Json<VerificationPayload>, JsonRejection>,
) -> Result<Response, GatewayError> {
    let Json(payload) =
        payload.map_err(|rejection| GatewayError::from_rejection(rejection, state.max_body_bytes))?;
    debug!(
        subject_id = payload.subject_id.as_deref().unwrap_or_default(),
        "Verification request received"
    );

    let verifier = state.verifier.clone();
    let result = tokio::task::spawn_blocking(move || verifier.verify_payload(payload))
        .await
        .map_err(|e| {
            error!(error = %e, "Verification task failed");
            GatewayError::InternalError(e.to_string())
        })?;

    Ok((status_for(&result), Json(result)).into_response())
}
