//! Request gate
//!
//! Router-wide middleware that authenticates every request outside a small
//! public set. A verified request carries its [`InstallationIdentity`] as a
//! request extension; anything else stops here with a generic `401`.
//!
//! [`InstallationIdentity`]: installgate_core::InstallationIdentity

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use installgate_core::CredentialError;
use std::sync::Arc;
use tracing::{error, warn};

use crate::api::error::ApiError;
use crate::api::handlers::AppState;
use crate::auth::AuthError;

/// Paths served without a credential
pub const PUBLIC_PATHS: [&str; 5] = ["/", "/manifest", "/health", "/ready", "/install_cb"];

/// Prefix of the public static asset tree
pub const STATIC_PREFIX: &str = "/static";

/// Whether `path` bypasses the gate
pub fn is_public_path(path: &str) -> bool {
    if PUBLIC_PATHS.contains(&path) {
        return true;
    }
    match path.strip_prefix(STATIC_PREFIX) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Gate middleware
pub async fn gate(State(state): State<Arc<AppState>>, mut req: Request, next: Next) -> Response {
    if is_public_path(req.uri().path()) {
        return next.run(req).await;
    }

    let header = req
        .headers()
        .get(AUTHORIZATION)
        .map(|value| value.to_str().map(str::to_owned));

    let verified = match header {
        Some(Ok(header)) => state.verifier.verify_header(Some(&header)).await,
        Some(Err(_)) => Err(AuthError::Credential(CredentialError::MalformedHeader(
            "Authorization header is not visible ASCII".into(),
        ))),
        None => state.verifier.verify_header(None).await,
    };

    match verified {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(err) => {
            let path = req.uri().path();
            if err.is_client_error() {
                warn!(path = %path, error = %err, "Rejected request");
            } else {
                error!(path = %path, error = %err, "Credential verification failed");
            }
            ApiError::Unauthorized("Invalid or missing credential".into()).into_response()
        }
    }
}
