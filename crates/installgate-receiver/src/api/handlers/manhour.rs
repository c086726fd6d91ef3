//! Work-Hour Validation Hook
//!
//! The platform asks the app whether a work-hour change may proceed. The
//! hook calls the platform API back as the requesting user, with a token
//! minted from the caller's installation secret, then answers with the
//! configured verdict.

use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use installgate_core::InstallationIdentity;
use installgate_platform::Method;

use crate::api::error::ApiError;
use crate::api::handlers::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ManhourOptions {
    #[serde(default)]
    pub scene: String,
}

/// Validation request
#[derive(Debug, Deserialize)]
pub struct ManhourValidateRequest {
    /// Estimated, logged or remaining hours
    #[serde(rename = "type", default)]
    pub kind: String,

    /// add, update or delete
    #[serde(default)]
    pub action: String,

    #[serde(default)]
    pub mode: String,

    #[serde(default)]
    pub options: ManhourOptions,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManhourVerdict {
    pub reason: String,
    pub level: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ManhourValidateResponse {
    pub error: ManhourVerdict,
}

/// Work-hour validation
///
/// POST /manhour/validate
pub async fn validate_manhour(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<InstallationIdentity>,
    Json(request): Json<ManhourValidateRequest>,
) -> Result<Json<ManhourValidateResponse>, ApiError> {
    let record = state.store.get(&identity.installation_id).await?;

    let response = state
        .platform
        .call_api(&record, &identity.user_id, &state.manhour.probe_path, Method::GET, None)
        .await?;

    info!(
        installation_id = %identity.installation_id,
        user_id = %identity.user_id,
        kind = %request.kind,
        action = %request.action,
        mode = %request.mode,
        scene = %request.options.scene,
        probe_status = response.status.as_u16(),
        "Work-hour validation"
    );
    debug!(body = %response.text(), "Probe response");

    Ok(Json(ManhourValidateResponse {
        error: ManhourVerdict {
            reason: state.manhour.reject_reason.clone(),
            level: "error".into(),
        },
    }))
}
