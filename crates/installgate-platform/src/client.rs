//! Platform API client
//!
//! Every outbound call is made on behalf of one installation and one acting
//! user: a client assertion is minted with the installation's shared secret,
//! exchanged at `<base>/oauth2/token` for an access token, and the token is
//! used as the bearer for `<base>/openapi/v2<path>`.

use moka::future::Cache;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Request, Response, Url};
use std::sync::Arc;
use tracing::{debug, info, warn};

use installgate_core::{mint_assertion, InstallationRecord};

use crate::config::PlatformClientConfig;
use crate::error::{PlatformError, Result};
use crate::types::{AccessToken, PlatformResponse, TokenResponse};

/// Token endpoint path, relative to the installation's base URL
pub const TOKEN_PATH: &str = "/oauth2/token";

/// Prefix of every platform API path
pub const OPENAPI_PREFIX: &str = "/openapi/v2";

/// `client_assertion_type` sent with every exchange
pub const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Cache key for exchanged tokens
///
/// Includes the encoded secret and base URL so that a lifecycle callback
/// rotating either one never serves a token minted under the old values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TokenCacheKey {
    installation_id: String,
    user_id: String,
    base_url: String,
    secret: String,
}

impl TokenCacheKey {
    fn new(record: &InstallationRecord, user_id: &str) -> Self {
        Self {
            installation_id: record.installation_id.clone(),
            user_id: user_id.to_string(),
            base_url: record.ones_base_url.clone(),
            secret: record.shared_secret.encoded().to_string(),
        }
    }
}

/// Client for the platform's token endpoint and open API
pub struct PlatformClient {
    http: reqwest::Client,
    config: PlatformClientConfig,
    token_cache: Option<Cache<TokenCacheKey, Arc<AccessToken>>>,
}

impl PlatformClient {
    /// Create a client from configuration
    pub fn new(config: PlatformClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PlatformError::InvalidRequest(format!("failed to build HTTP client: {}", e)))?;

        let token_cache = config.token_cache_ttl.map(|ttl| {
            Cache::builder()
                .time_to_live(ttl)
                .max_capacity(10_000)
                .build()
        });

        Ok(Self {
            http,
            config,
            token_cache,
        })
    }

    /// Client configuration
    pub fn config(&self) -> &PlatformClientConfig {
        &self.config
    }

    // =========================================================================
    // Token Exchange
    // =========================================================================

    /// Obtain an access token for `record` acting as `user_id`
    ///
    /// Mints a fresh assertion and exchanges it, unless the token cache is
    /// enabled and holds a live token for the same installation, user and
    /// secret.
    pub async fn get_access_token(&self, record: &InstallationRecord, user_id: &str) -> Result<AccessToken> {
        let Some(cache) = &self.token_cache else {
            return self.exchange_assertion(record, user_id).await;
        };

        let key = TokenCacheKey::new(record, user_id);
        if let Some(cached) = cache.get(&key).await {
            debug!(installation_id = %record.installation_id, user_id = %user_id, "Using cached access token");
            return Ok(cached.as_ref().clone());
        }

        let token = self.exchange_assertion(record, user_id).await?;

        // Tokens that die before the cache entry would are not worth keeping
        let ttl_secs = self.config.token_cache_ttl.map(|t| t.as_secs()).unwrap_or_default();
        if token.expires_in.map_or(true, |exp| exp > ttl_secs) {
            cache.insert(key, Arc::new(token.clone())).await;
        }

        Ok(token)
    }

    async fn exchange_assertion(&self, record: &InstallationRecord, user_id: &str) -> Result<AccessToken> {
        let assertion = mint_assertion(record, user_id)?;
        let url = resolve_url(&record.ones_base_url, TOKEN_PATH)?;

        let form = [
            ("grant_type", "client_credentials"),
            ("client_assertion", assertion.as_str()),
            ("client_id", record.installation_id.as_str()),
            ("client_assertion_type", CLIENT_ASSERTION_TYPE),
        ];

        let request = self.http.post(url.clone()).form(&form).build()?;

        debug!(
            installation_id = %record.installation_id,
            url = %url,
            "Exchanging client assertion"
        );

        let response = self.execute(request).await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            warn!(
                installation_id = %record.installation_id,
                status = %status,
                "Token exchange rejected"
            );
            return Err(PlatformError::TokenRejected {
                status: status.as_u16(),
                body: truncate(&String::from_utf8_lossy(&body), 512),
            });
        }

        let token = TokenResponse::parse(&body)?.into_access_token()?;

        info!(
            installation_id = %record.installation_id,
            user_id = %user_id,
            expires_in = ?token.expires_in,
            "Obtained platform access token"
        );

        Ok(token)
    }

    // =========================================================================
    // API Calls
    // =========================================================================

    /// Call `<base>/openapi/v2<path>` as `user_id` of `record`
    ///
    /// `path` may carry a query string. The response is returned verbatim
    /// whatever its status code.
    pub async fn call_api(
        &self,
        record: &InstallationRecord,
        user_id: &str,
        path: &str,
        method: Method,
        body: Option<Vec<u8>>,
    ) -> Result<PlatformResponse> {
        let token = self.get_access_token(record, user_id).await?;

        let api_path = if path.starts_with('/') {
            format!("{}{}", OPENAPI_PREFIX, path)
        } else {
            format!("{}/{}", OPENAPI_PREFIX, path)
        };
        let url = resolve_url(&record.ones_base_url, &api_path)?;

        let mut builder = self
            .http
            .request(method.clone(), url.clone())
            .header(CONTENT_TYPE, "application/json")
            .bearer_auth(&token.access_token);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        let request = builder.build()?;

        let response = self.execute(request).await?;
        let status = response.status();
        let body = response.bytes().await?;

        debug!(
            installation_id = %record.installation_id,
            method = %method,
            path = %url.path(),
            status = %status,
            bytes = body.len(),
            "Platform API call complete"
        );

        Ok(PlatformResponse {
            status,
            body: body.to_vec(),
        })
    }

    // =========================================================================
    // Transport
    // =========================================================================

    /// Send a request, retrying transport failures per the retry policy
    async fn execute(&self, request: Request) -> Result<Response> {
        let policy = &self.config.retry;
        let idempotent = is_idempotent(request.method());
        let mut attempt = 0;

        loop {
            attempt += 1;
            let this_try = request
                .try_clone()
                .ok_or_else(|| PlatformError::InvalidRequest("request body cannot be replayed".into()))?;

            match self.http.execute(this_try).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    let retryable = err.is_connect() || (err.is_timeout() && idempotent);
                    if !retryable || attempt >= policy.max_attempts {
                        warn!(
                            method = %request.method(),
                            url = %request.url(),
                            attempt = attempt,
                            error = %err,
                            "Platform request failed"
                        );
                        return Err(PlatformError::Network(err.to_string()));
                    }

                    let delay = policy.backoff(attempt);
                    warn!(
                        method = %request.method(),
                        url = %request.url(),
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying platform request"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Resolve `path` against an installation's base URL
///
/// Absolute paths replace the base URL's path, keeping scheme, host and port.
pub fn resolve_url(base_url: &str, path: &str) -> Result<Url> {
    let base = Url::parse(base_url).map_err(|e| PlatformError::InvalidBaseUrl(format!("{}: {}", base_url, e)))?;
    if base.cannot_be_a_base() {
        return Err(PlatformError::InvalidBaseUrl(format!("{}: not a base URL", base_url)));
    }
    base.join(path)
        .map_err(|e| PlatformError::InvalidBaseUrl(format!("cannot join {} onto {}: {}", path, base_url, e)))
}

fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::PUT | Method::DELETE
    )
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
