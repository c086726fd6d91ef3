//! Installation Listing Handlers
//!
//! Administrative views of stored records, scoped to the caller. Secrets
//! are never returned.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use installgate_core::{AppInfo, InstallationIdentity, InstallationRecord};

use crate::api::error::ApiError;
use crate::api::handlers::AppState;

/// Installation record without its shared secret
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstallationView {
    pub installation_id: String,
    pub org_id: String,
    pub ones_base_url: String,
    pub callback_type: String,
    pub time_stamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<AppInfo>,
}

impl From<InstallationRecord> for InstallationView {
    fn from(record: InstallationRecord) -> Self {
        Self {
            installation_id: record.installation_id,
            org_id: record.org_id,
            ones_base_url: record.ones_base_url,
            callback_type: record.callback_type,
            time_stamp: record.time_stamp,
            app: record.app,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListInstallationsResponse {
    pub installations: Vec<InstallationView>,
    pub count: usize,
}

/// List installations in the caller's organization
///
/// GET /installations
pub async fn list_installations(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<InstallationIdentity>,
) -> Result<Json<ListInstallationsResponse>, ApiError> {
    let caller = state.store.get(&identity.installation_id).await?;

    let installations: Vec<InstallationView> = state
        .store
        .list()
        .await?
        .into_iter()
        .filter(|record| record.org_id == caller.org_id)
        .map(InstallationView::from)
        .collect();

    Ok(Json(ListInstallationsResponse {
        count: installations.len(),
        installations,
    }))
}

/// Fetch the caller's own installation
///
/// GET /installations/{installation_id}
pub async fn get_installation(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<InstallationIdentity>,
    Path(installation_id): Path<String>,
) -> Result<Json<InstallationView>, ApiError> {
    if installation_id != identity.installation_id {
        warn!(
            caller = %identity.installation_id,
            target = %installation_id,
            "Installation lookup for another installation"
        );
        return Err(ApiError::Forbidden("Installation does not match credential".into()));
    }

    let record = state.store.get(&installation_id).await?;
    Ok(Json(record.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use installgate_core::SharedSecret;

    #[test]
    fn test_view_omits_secret() {
        let record = InstallationRecord {
            installation_id: "install_1".into(),
            org_id: "org_1".into(),
            ones_base_url: "https://ones.example.com".into(),
            shared_secret: SharedSecret::from_bytes(b"top-secret"),
            callback_type: "install".into(),
            time_stamp: 1,
            app: None,
        };
        let encoded = record.shared_secret.encoded().to_string();

        let json = serde_json::to_string(&InstallationView::from(record)).unwrap();
        assert!(!json.contains("shared_secret"));
        assert!(!json.contains(&encoded));
    }
}
