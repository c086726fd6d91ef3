//! Platform Client
//!
//! Talks to the host platform on behalf of one installation at a time.
//!
//! ## Flow
//!
//! 1. Mint a 24h client assertion signed with the installation's shared secret
//! 2. `POST <base>/oauth2/token` with the assertion (client-credentials form)
//! 3. Call `<base>/openapi/v2<path>` with the returned access token
//!
//! Every call re-mints and re-exchanges unless the access-token cache is
//! enabled in [`PlatformClientConfig`]. Responses from the open API are
//! returned verbatim, status code included; classifying them is up to the
//! caller.
//!
//! ## Failure Policy
//!
//! Transport failures follow the configured [`RetryPolicy`] (fail fast by
//! default). Each outbound request is bounded by the client timeout, and
//! dropping the returned future aborts the request in flight.
//!
//! ## Usage
//!
//! ```ignore
//! use installgate_platform::{PlatformClient, PlatformClientConfig};
//! use reqwest::Method;
//!
//! let client = PlatformClient::new(PlatformClientConfig::default())?;
//! let response = client
//!     .call_api(&record, "user1", "/project/issues?teamID=abc", Method::GET, None)
//!     .await?;
//! println!("{} {}", response.status, response.text());
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use client::{resolve_url, PlatformClient, CLIENT_ASSERTION_TYPE, OPENAPI_PREFIX, TOKEN_PATH};
pub use config::{PlatformClientConfig, RetryPolicy};
pub use error::{PlatformError, Result};
pub use reqwest::{Method, Url};
pub use types::{AccessToken, PlatformResponse};
