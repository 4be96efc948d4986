//! Native Credential Provider Abstraction
//!
//! The credential object owned by each platform's identity SDK (for example
//! the caching credentials provider on Android or the credentials provider
//! configured on iOS). It owns persistence of the login map and the resolved
//! identity id; the core only drives it.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::Result;

/// Provider name → opaque login token.
///
/// Presence of a key means that provider is currently linked.
pub type LoginMap = BTreeMap<String, String>;

/// Platform credential provider
///
/// Implementations wrap the native SDK object. Every method may suspend on a
/// native call; failures surface as [`BridgeError`](crate::BridgeError).
///
/// # Example
///
/// ```ignore
/// use bridge_traits::credentials::CredentialProvider;
///
/// async fn link(provider: &dyn CredentialProvider, service: &str, token: &str) -> Result<String> {
///     let mut logins = provider.logins().await?;
///     logins.insert(service.to_string(), token.to_string());
///     provider.set_logins(logins).await?;
///     provider.refresh().await
/// }
/// ```
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Cached identity id, if one has been resolved. Never hits the network.
    async fn identity_id(&self) -> Result<Option<String>>;

    /// Current login map.
    async fn logins(&self) -> Result<LoginMap>;

    /// Replace the login map and mark cached credentials as expired.
    async fn set_logins(&self, logins: LoginMap) -> Result<()>;

    /// Fetch credentials for the current login map and return the resolved
    /// identity id.
    async fn refresh(&self) -> Result<String>;

    /// Adopt an identity minted outside the provider (developer-authenticated
    /// flow) together with its login map, without a refresh round trip.
    async fn install_identity(&self, identity_id: String, logins: LoginMap) -> Result<()>;
}
