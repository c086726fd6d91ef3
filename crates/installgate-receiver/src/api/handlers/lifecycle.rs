//! Installation Lifecycle Handlers
//!
//! The platform posts one of four callbacks whenever an installation
//! changes state. Every callback upserts the installation record; the
//! record is never deleted, so a disabled or uninstalled installation keeps
//! its secret and keeps verifying.

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use installgate_core::{
    AppInfo, InstallationIdentity, InstallationRecord, SharedSecret, VerificationOptions,
};
use installgate_platform::{PlatformClient, Url};

use crate::api::error::ApiError;
use crate::api::handlers::events::EventTally;
use crate::auth::CredentialVerifier;
use crate::config::ManhourSettings;
use crate::storage::InstallationStore;

/// Shared application state
pub struct AppState {
    /// Installation records
    pub store: Arc<dyn InstallationStore>,

    /// Inbound credential verifier over `store`
    pub verifier: CredentialVerifier,

    /// Outbound platform client
    pub platform: PlatformClient,

    /// Per-subscriber event counts
    pub events: EventTally,

    /// Work-hour validation hook settings
    pub manhour: ManhourSettings,
}

impl AppState {
    /// Wire up state around a store
    pub fn new(
        store: Arc<dyn InstallationStore>,
        verification: VerificationOptions,
        platform: PlatformClient,
        manhour: ManhourSettings,
    ) -> Self {
        Self {
            verifier: CredentialVerifier::new(store.clone(), verification),
            store,
            platform,
            events: EventTally::default(),
            manhour,
        }
    }
}

/// Lifecycle callback body, shared by all four callback routes
#[derive(Debug, Deserialize)]
pub struct LifecycleCallbackRequest {
    #[serde(default)]
    pub installation_id: String,

    #[serde(default)]
    pub org_id: String,

    #[serde(default)]
    pub ones_base_url: String,

    /// Base64-encoded key
    #[serde(default)]
    pub shared_secret: String,

    /// Defaults to the route's callback type when empty
    #[serde(default)]
    pub callback_type: String,

    #[serde(default)]
    pub time_stamp: i64,

    #[serde(default)]
    pub app: Option<AppInfo>,
}

/// Lifecycle callback acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct LifecycleCallbackResponse {
    pub installation_id: String,

    /// Server time of the acknowledgement, seconds since epoch
    pub time_stamp: i64,
}

impl LifecycleCallbackRequest {
    /// Validate and convert into the record to store
    fn into_record(self, route_callback_type: &str) -> Result<InstallationRecord, ApiError> {
        if self.installation_id.trim().is_empty() {
            return Err(ApiError::BadRequest("installation_id cannot be empty".into()));
        }

        let shared_secret = SharedSecret::new(self.shared_secret);
        shared_secret
            .decode()
            .map_err(|_| ApiError::BadRequest("shared_secret must be non-empty base64".into()))?;

        let base_url = Url::parse(&self.ones_base_url)
            .map_err(|e| ApiError::BadRequest(format!("Invalid ones_base_url: {}", e)))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ApiError::BadRequest("ones_base_url must be an http(s) URL".into()));
        }

        let callback_type = if self.callback_type.is_empty() {
            route_callback_type.to_string()
        } else {
            self.callback_type
        };

        Ok(InstallationRecord {
            installation_id: self.installation_id,
            org_id: self.org_id,
            ones_base_url: self.ones_base_url,
            shared_secret,
            callback_type,
            time_stamp: self.time_stamp,
            app: self.app,
        })
    }
}

fn acknowledge(installation_id: String) -> Json<LifecycleCallbackResponse> {
    Json(LifecycleCallbackResponse {
        installation_id,
        time_stamp: Utc::now().timestamp(),
    })
}

async fn save(state: &AppState, record: InstallationRecord) -> Result<Json<LifecycleCallbackResponse>, ApiError> {
    let installation_id = record.installation_id.clone();
    state.store.upsert(record).await?;
    Ok(acknowledge(installation_id))
}

/// Install callback
///
/// POST /install_cb
///
/// Public, since the first install has no secret to sign with yet. A new
/// identifier is registered with an insert that never replaces, so racing
/// first installs cannot overwrite each other. Once a record exists,
/// replacing it requires a credential that verifies against the secret
/// currently on file.
pub async fn install_cb(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<LifecycleCallbackRequest>,
) -> Result<Json<LifecycleCallbackResponse>, ApiError> {
    let record = request.into_record("install")?;

    info!(
        installation_id = %record.installation_id,
        org_id = %record.org_id,
        app = ?record.app.as_ref().map(|a| &a.id),
        "Install callback"
    );

    if state.store.insert_if_absent(record.clone()).await? {
        return Ok(acknowledge(record.installation_id));
    }

    let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let identity = state.verifier.verify_header(header).await.map_err(|err| {
        warn!(
            installation_id = %record.installation_id,
            error = %err,
            "Rejected install callback overwriting an existing installation"
        );
        ApiError::Unauthorized("Valid credential required to replace an installation".into())
    })?;

    if identity.installation_id != record.installation_id {
        warn!(
            caller = %identity.installation_id,
            target = %record.installation_id,
            "Install callback credential belongs to another installation"
        );
        return Err(ApiError::Unauthorized(
            "Valid credential required to replace an installation".into(),
        ));
    }

    save(&state, record).await
}

async fn gated_callback(
    state: &AppState,
    identity: &InstallationIdentity,
    request: LifecycleCallbackRequest,
    route_callback_type: &str,
) -> Result<Json<LifecycleCallbackResponse>, ApiError> {
    let record = request.into_record(route_callback_type)?;

    if record.installation_id != identity.installation_id {
        warn!(
            caller = %identity.installation_id,
            target = %record.installation_id,
            callback_type = route_callback_type,
            "Lifecycle callback for another installation"
        );
        return Err(ApiError::Forbidden("Callback installation does not match credential".into()));
    }

    info!(
        installation_id = %record.installation_id,
        callback_type = %record.callback_type,
        "Lifecycle callback"
    );

    save(state, record).await
}

/// Uninstall callback
///
/// POST /uninstall_cb
pub async fn uninstall_cb(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<InstallationIdentity>,
    Json(request): Json<LifecycleCallbackRequest>,
) -> Result<Json<LifecycleCallbackResponse>, ApiError> {
    gated_callback(&state, &identity, request, "uninstall").await
}

/// Enabled callback
///
/// POST /enabled_cb
pub async fn enabled_cb(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<InstallationIdentity>,
    Json(request): Json<LifecycleCallbackRequest>,
) -> Result<Json<LifecycleCallbackResponse>, ApiError> {
    gated_callback(&state, &identity, request, "enabled").await
}

/// Disabled callback
///
/// POST /disabled_cb
pub async fn disabled_cb(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<InstallationIdentity>,
    Json(request): Json<LifecycleCallbackRequest>,
) -> Result<Json<LifecycleCallbackResponse>, ApiError> {
    gated_callback(&state, &identity, request, "disabled").await
}
