//! Settings page entries for the embedded UI

use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use installgate_core::InstallationIdentity;

/// Page served for the single settings entry
pub const SETTINGS_PAGE_URL: &str = "/static/page1.html";

#[derive(Debug, Deserialize)]
pub struct SettingPageEntriesRequest {
    #[serde(default)]
    pub user_uuid: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub timezone: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettingPageEntry {
    pub title: String,
    pub page_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SettingPageEntriesResponse {
    pub entries: Vec<SettingPageEntry>,
}

fn entry_title(language: &str) -> &'static str {
    if language == "zh" {
        "测试"
    } else {
        "Test"
    }
}

/// Settings page entries
///
/// POST /settingPage/entries
pub async fn setting_page_entries(
    Extension(identity): Extension<InstallationIdentity>,
    Json(request): Json<SettingPageEntriesRequest>,
) -> Json<SettingPageEntriesResponse> {
    info!(
        installation_id = %identity.installation_id,
        user_uuid = %request.user_uuid,
        language = %request.language,
        timezone = %request.timezone,
        "Settings page entries requested"
    );

    Json(SettingPageEntriesResponse {
        entries: vec![SettingPageEntry {
            title: entry_title(&request.language).to_string(),
            page_url: SETTINGS_PAGE_URL.to_string(),
        }],
    })
}
