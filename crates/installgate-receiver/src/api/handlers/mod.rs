//! API request handlers

pub mod events;
pub mod installations;
pub mod lifecycle;
pub mod manhour;
pub mod oauth;
pub mod settings;

pub use events::{handle_event, EventAck, EventTally, PlatformEvent};
pub use installations::{get_installation, list_installations, InstallationView, ListInstallationsResponse};
pub use lifecycle::{
    disabled_cb, enabled_cb, install_cb, uninstall_cb, AppState, LifecycleCallbackRequest,
    LifecycleCallbackResponse,
};
pub use manhour::{validate_manhour, ManhourValidateRequest, ManhourValidateResponse, ManhourVerdict};
pub use oauth::{oauth_callback, OauthCallbackQuery, OauthCallbackResponse};
pub use settings::{setting_page_entries, SettingPageEntriesRequest, SettingPageEntriesResponse, SettingPageEntry};
