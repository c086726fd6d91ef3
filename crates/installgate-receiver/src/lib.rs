//! Installgate Receiver
//!
//! HTTP service for an app installed into a host platform. It records
//! installation lifecycle callbacks, authenticates every inbound request
//! against the secret of the installation it claims to come from, and calls
//! the platform back on behalf of that installation.
//!
//! ## Request Gate
//!
//! Every route except the public set runs behind [`api::gate::gate`]:
//! 1. Extract the bearer token from `Authorization`
//! 2. Read the untrusted `sub` claim and load that installation's record
//! 3. Verify the token with the record's shared secret
//! 4. Attach the resulting [`InstallationIdentity`] to the request
//!
//! Any failure is a `401` with a generic body; the reason is only logged.
//!
//! ## API Endpoints
//!
//! ### Public
//! - `GET /health` - Liveness check
//! - `GET /ready` - Readiness check with installation count
//! - `POST /install_cb` - Install callback (credential required to replace an existing installation)
//!
//! ### Gated
//! - `POST /uninstall_cb`, `/enabled_cb`, `/disabled_cb` - Lifecycle callbacks for the caller's installation
//! - `POST /events/webhook` - Platform event intake
//! - `POST /settingPage/entries` - Settings page entries for the embedded UI
//! - `POST /manhour/validate` - Work-hour validation hook (calls the platform back)
//! - `GET /oauth/callback` - OAuth authorization callback
//! - `GET /installations` - Installations in the caller's organization
//! - `GET /installations/{installation_id}` - The caller's own installation

pub mod api;
pub mod auth;
pub mod config;
pub mod storage;

pub use api::create_router;
pub use api::handlers::AppState;
pub use auth::{AuthError, CredentialVerifier};
pub use config::{ConfigError, ManhourSettings, ReceiverConfig};
pub use installgate_core::InstallationIdentity;
pub use storage::{InstallationStore, MemoryStore, StorageError};
#[cfg(feature = "sqlite")]
pub use storage::SqliteStore;
