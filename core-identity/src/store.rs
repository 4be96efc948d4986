//! Credential Store
//!
//! The owner of the login map and the resolved identity id. The refresh
//! coordinator drives the store; it never talks to the identity backend
//! directly.
//!
//! [`ProviderCredentialStore`] adapts a platform
//! [`CredentialProvider`](bridge_traits::CredentialProvider) to this
//! contract.

use async_trait::async_trait;
use bridge_traits::{CredentialProvider, LoginMap};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{IdentityError, Result};
use crate::types::{IdentityId, IdentitySnapshot};

/// Backend-facing credential store.
///
/// # Example
///
/// ```ignore
/// async fn link(store: &dyn CredentialStore, service: &str, token: &str) -> Result<IdentitySnapshot> {
///     let mut logins = store.current_login_map().await?;
///     logins.insert(service.to_string(), token.to_string());
///     store.begin_refresh(logins).await
/// }
/// ```
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Login map the store currently holds.
    async fn current_login_map(&self) -> Result<LoginMap>;

    /// Replace the login map and resolve the identity for it.
    ///
    /// On failure the error message is surfaced verbatim to callers.
    async fn begin_refresh(&self, logins: LoginMap) -> Result<IdentitySnapshot>;

    /// Adopt an identity minted by a remote exchange together with the
    /// login map it belongs to.
    async fn install(&self, identity_id: IdentityId, logins: LoginMap)
        -> Result<IdentitySnapshot>;
}

/// [`CredentialStore`] backed by a platform credential provider.
#[derive(Clone)]
pub struct ProviderCredentialStore {
    provider: Arc<dyn CredentialProvider>,
}

impl ProviderCredentialStore {
    pub fn new(provider: Arc<dyn CredentialProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn CredentialProvider> {
        &self.provider
    }
}

#[async_trait]
impl CredentialStore for ProviderCredentialStore {
    async fn current_login_map(&self) -> Result<LoginMap> {
        Ok(self.provider.logins().await?)
    }

    async fn begin_refresh(&self, logins: LoginMap) -> Result<IdentitySnapshot> {
        debug!(providers = logins.len(), "Replacing login map");
        self.provider
            .set_logins(logins.clone())
            .await
            .map_err(|e| IdentityError::RefreshFailed(e.to_string()))?;

        let identity_id = self.provider.refresh().await.map_err(|e| {
            warn!(error = %e, "Credential provider refresh failed");
            IdentityError::RefreshFailed(e.to_string())
        })?;

        if identity_id.is_empty() {
            return Err(IdentityError::RefreshFailed(
                "credential provider returned an empty identity id".to_string(),
            ));
        }

        Ok(IdentitySnapshot::from_logins(identity_id, &logins))
    }

    async fn install(
        &self,
        identity_id: IdentityId,
        logins: LoginMap,
    ) -> Result<IdentitySnapshot> {
        debug!(identity_id = %identity_id, providers = logins.len(), "Installing identity");
        self.provider
            .install_identity(identity_id.as_str().to_string(), logins.clone())
            .await
            .map_err(|e| IdentityError::RefreshFailed(e.to_string()))?;

        Ok(IdentitySnapshot::from_logins(identity_id, &logins))
    }
}
