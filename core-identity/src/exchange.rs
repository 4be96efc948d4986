//! # Remote Token Exchange
//!
//! The developer-authenticated provider does not hand out tokens on the
//! device. A backend function trades the host's user id (plus the current
//! login set) for an identity id and an opaque provider token.
//!
//! [`HttpTokenExchange`] is the JSON-over-HTTP implementation: the remote
//! function reference is a base URL exposing `exchange` and `detach`
//! endpoints. Requests are sent once; retries are the caller's business.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bridge_traits::LoginMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::{IdentityError, Result};
use crate::types::IdentityId;

/// Timeout applied to each remote call.
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Exchange request: the identity to attach to and the logins it carries.
///
/// `identity_id` is omitted on the wire when there are no prior logins so
/// the backend mints a fresh identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRequest {
    pub identity_pool_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_id: Option<IdentityId>,
    pub logins: LoginMap,
}

/// Identity id and opaque provider token minted by the backend.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeResponse {
    pub identity_id: IdentityId,
    pub token: String,
}

impl fmt::Debug for ExchangeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeResponse")
            .field("identity_id", &self.identity_id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Backend collaborator for the developer-authenticated provider.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Trade `user_id` for an identity id and provider token.
    async fn exchange(&self, user_id: &str, request: ExchangeRequest) -> Result<ExchangeResponse>;

    /// Detach `user_id` from `identity_id` on the backend.
    async fn detach(&self, user_id: &str, identity_id: &IdentityId) -> Result<()>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeCall<'a> {
    user_id: &'a str,
    #[serde(flatten)]
    request: &'a ExchangeRequest,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DetachCall<'a> {
    user_id: &'a str,
    identity_id: &'a IdentityId,
}

/// [`TokenExchange`] calling a remote function over HTTP.
#[derive(Clone)]
pub struct HttpTokenExchange {
    http_client: Arc<dyn HttpClient>,
    exchange_url: Url,
    detach_url: Url,
}

impl HttpTokenExchange {
    /// Create an exchange client for the function at `remote_function`.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` when the reference is not an absolute
    /// `http(s)` URL.
    pub fn new(http_client: Arc<dyn HttpClient>, remote_function: &str) -> Result<Self> {
        let base = Url::parse(remote_function).map_err(|e| {
            IdentityError::InvalidConfiguration(format!(
                "Invalid remote function reference '{}': {}",
                remote_function, e
            ))
        })?;

        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(IdentityError::InvalidConfiguration(format!(
                "Remote function reference must be an http(s) URL: {}",
                remote_function
            )));
        }

        Ok(Self {
            http_client,
            exchange_url: endpoint(&base, "exchange")?,
            detach_url: endpoint(&base, "detach")?,
        })
    }

    pub fn exchange_url(&self) -> &Url {
        &self.exchange_url
    }

    pub fn detach_url(&self) -> &Url {
        &self.detach_url
    }
}

fn endpoint(base: &Url, name: &str) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| {
            IdentityError::InvalidConfiguration(format!("Cannot extend remote function URL {}", base))
        })?
        .pop_if_empty()
        .push(name);
    Ok(url)
}

#[async_trait]
impl TokenExchange for HttpTokenExchange {
    #[instrument(skip(self, request), fields(has_identity = request.identity_id.is_some()))]
    async fn exchange(&self, user_id: &str, request: ExchangeRequest) -> Result<ExchangeResponse> {
        let body = ExchangeCall {
            user_id,
            request: &request,
        };
        let http_request = HttpRequest::new(HttpMethod::Post, self.exchange_url.as_str())
            .json(&body)
            .map_err(|e| IdentityError::ExchangeFailed(format!("Failed to encode request: {}", e)))?
            .timeout(EXCHANGE_TIMEOUT);

        debug!("Calling remote token exchange");
        let response = self
            .http_client
            .execute(http_request)
            .await
            .map_err(|e| IdentityError::ExchangeFailed(e.to_string()))?;

        if !response.is_success() {
            let status = response.status;
            let error_body = response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            warn!(status = status, error = %error_body, "Remote token exchange rejected");
            return Err(IdentityError::ExchangeFailed(format!(
                "Exchange endpoint returned {}: {}",
                status, error_body
            )));
        }

        let parsed: ExchangeResponse = response.json().map_err(|e| {
            IdentityError::ExchangeFailed(format!("Failed to parse exchange response: {}", e))
        })?;

        if parsed.identity_id.as_str().is_empty() {
            return Err(IdentityError::ExchangeFailed(
                "Exchange response carries an empty identityId".to_string(),
            ));
        }

        Ok(parsed)
    }

    #[instrument(skip(self, identity_id), fields(identity_id = %identity_id))]
    async fn detach(&self, user_id: &str, identity_id: &IdentityId) -> Result<()> {
        let body = DetachCall {
            user_id,
            identity_id,
        };
        let http_request = HttpRequest::new(HttpMethod::Post, self.detach_url.as_str())
            .json(&body)
            .map_err(|e| IdentityError::DetachFailed(format!("Failed to encode request: {}", e)))?
            .timeout(EXCHANGE_TIMEOUT);

        let response = self
            .http_client
            .execute(http_request)
            .await
            .map_err(|e| IdentityError::DetachFailed(e.to_string()))?;

        if !response.is_success() {
            let status = response.status;
            let error_body = response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            warn!(status = status, error = %error_body, "Remote detach rejected");
            return Err(IdentityError::DetachFailed(format!(
                "Detach endpoint returned {}: {}",
                status, error_body
            )));
        }

        Ok(())
    }
}

impl fmt::Debug for HttpTokenExchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTokenExchange")
            .field("exchange_url", &self.exchange_url.as_str())
            .field("detach_url", &self.detach_url.as_str())
            .finish()
    }
}
