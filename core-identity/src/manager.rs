//! # Token Manager
//!
//! Public add/remove-login operations built on the [`RefreshCoordinator`].
//!
//! Mutations are serialized by a lock shared with the
//! [`CustomProviderBridge`](crate::custom::CustomProviderBridge): each one
//! reads the current snapshot, decides whether anything changes, copies the
//! store's login map and drives a refresh before the next mutation may read
//! that map. Linking an already linked service (or unlinking an absent one)
//! returns the current snapshot without touching the store.

use bridge_traits::LoginMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

use crate::coordinator::RefreshCoordinator;
use crate::error::Result;
use crate::types::IdentitySnapshot;

/// Add/remove linked logins and read the current identity.
///
/// # Example
///
/// ```no_run
/// use core_identity::{ChangeHookRegistry, CredentialStore, RefreshCoordinator, TokenManager};
/// use core_runtime::events::EventBus;
/// use std::sync::Arc;
///
/// # async fn example(store: Arc<dyn CredentialStore>) -> core_identity::Result<()> {
/// let coordinator = RefreshCoordinator::new(store, ChangeHookRegistry::new(), EventBus::default());
/// let tokens = TokenManager::new(coordinator);
///
/// let snapshot = tokens.set_token("google", "id-token").await?;
/// assert!(snapshot.is_linked("google"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct TokenManager {
    coordinator: RefreshCoordinator,
    mutations: Arc<Mutex<()>>,
}

impl TokenManager {
    pub fn new(coordinator: RefreshCoordinator) -> Self {
        Self {
            coordinator,
            mutations: Arc::new(Mutex::new(())),
        }
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Snapshot of the most recent (or in-flight) refresh; triggers one if
    /// none has run.
    pub async fn identity(&self) -> Result<IdentitySnapshot> {
        self.coordinator.current().await
    }

    /// Link `service` with `token`.
    ///
    /// No-op when `service` is already linked: the token is not re-sent.
    #[instrument(skip(self, token))]
    pub async fn set_token(&self, service: &str, token: &str) -> Result<IdentitySnapshot> {
        let _guard = self.lock_mutations().await;

        let current = self.coordinator.current().await?;
        if current.is_linked(service) {
            debug!("Service already linked");
            return Ok(current);
        }

        let mut logins = self.coordinator.store().current_login_map().await?;
        logins.insert(service.to_string(), token.to_string());

        info!("Linking service");
        self.coordinator.refresh(logins).await
    }

    /// Unlink `service`. No-op when it is not linked.
    #[instrument(skip(self))]
    pub async fn remove_token(&self, service: &str) -> Result<IdentitySnapshot> {
        let _guard = self.lock_mutations().await;
        self.remove_token_locked(service).await
    }

    /// [`remove_token`](Self::remove_token) for callers already holding the
    /// mutation lock.
    pub(crate) async fn remove_token_locked(&self, service: &str) -> Result<IdentitySnapshot> {
        let current = self.coordinator.current().await?;
        if !current.is_linked(service) {
            debug!("Service not linked");
            return Ok(current);
        }

        let mut logins: LoginMap = self.coordinator.store().current_login_map().await?;
        logins.remove(service);

        info!("Unlinking service");
        self.coordinator.refresh(logins).await
    }

    pub(crate) async fn lock_mutations(&self) -> MutexGuard<'_, ()> {
        self.mutations.lock().await
    }
}
