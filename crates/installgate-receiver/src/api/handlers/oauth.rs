//! OAuth authorization callback

use axum::{extract::Query, Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use installgate_core::InstallationIdentity;

#[derive(Debug, Deserialize)]
pub struct OauthCallbackQuery {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub installation_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OauthCallbackResponse {
    pub status: String,
    pub code: String,
    pub installation_id: String,
}

/// GET /oauth/callback
pub async fn oauth_callback(
    Extension(identity): Extension<InstallationIdentity>,
    Query(query): Query<OauthCallbackQuery>,
) -> Json<OauthCallbackResponse> {
    info!(
        caller = %identity.installation_id,
        installation_id = %query.installation_id,
        "OAuth callback"
    );

    Json(OauthCallbackResponse {
        status: "success".into(),
        code: query.code,
        installation_id: query.installation_id,
    })
}
