//! # Custom Provider Bridge
//!
//! Links and unlinks the developer-authenticated provider. Unlike the other
//! providers its token is minted by a remote [`TokenExchange`], and the
//! resulting identity is installed directly instead of being refreshed.
//!
//! Both edges of the per-service state machine cross the backend first:
//! linking exchanges before any local change, unlinking detaches remotely
//! before the login is removed. A remote failure leaves local state as it
//! was.

use core_runtime::config::IdentityConfig;
use core_runtime::events::{CoreEvent, EventBus, IdentityEvent};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::{IdentityError, Result};
use crate::exchange::{ExchangeRequest, TokenExchange};
use crate::manager::TokenManager;
use crate::types::IdentitySnapshot;

#[derive(Clone)]
pub struct CustomProviderBridge {
    provider_id: String,
    identity_pool_id: String,
    exchange: Arc<dyn TokenExchange>,
    tokens: TokenManager,
    event_bus: EventBus,
}

impl CustomProviderBridge {
    pub fn new(
        provider_id: impl Into<String>,
        identity_pool_id: impl Into<String>,
        exchange: Arc<dyn TokenExchange>,
        tokens: TokenManager,
        event_bus: EventBus,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            identity_pool_id: identity_pool_id.into(),
            exchange,
            tokens,
            event_bus,
        }
    }

    /// Bridge for the custom provider declared in `config`.
    ///
    /// # Errors
    ///
    /// `CustomProviderNotConfigured` when `config` declares none.
    pub fn from_config(
        config: &IdentityConfig,
        exchange: Arc<dyn TokenExchange>,
        tokens: TokenManager,
        event_bus: EventBus,
    ) -> Result<Self> {
        let provider_id = config
            .custom_provider_id()
            .ok_or(IdentityError::CustomProviderNotConfigured)?;

        Ok(Self::new(
            provider_id,
            config.identity_pool_id.clone(),
            exchange,
            tokens,
            event_bus,
        ))
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    /// Link the custom provider for `user_id`.
    ///
    /// The exchange request carries the current identity id only when other
    /// logins exist; a brand-new identity lets the backend mint one.
    #[instrument(skip(self), fields(provider = %self.provider_id))]
    pub async fn set_custom_token(&self, user_id: &str) -> Result<IdentitySnapshot> {
        let _guard = self.tokens.lock_mutations().await;
        let coordinator = self.tokens.coordinator();

        let current = coordinator.current().await?;
        if current.is_linked(&self.provider_id) {
            debug!("Custom provider already linked");
            return Ok(current);
        }

        let mut logins = coordinator.store().current_login_map().await?;
        let request = ExchangeRequest {
            identity_pool_id: self.identity_pool_id.clone(),
            identity_id: (!logins.is_empty()).then(|| current.identity_id().clone()),
            logins: logins.clone(),
        };

        let response = self.exchange.exchange(user_id, request).await.map_err(|e| {
            warn!(error = %e, "Custom provider exchange failed");
            e
        })?;

        logins.insert(self.provider_id.clone(), response.token);
        let snapshot = coordinator.install(response.identity_id, logins).await?;

        info!(identity_id = %snapshot.identity_id(), "Custom provider linked");
        let _ = self
            .event_bus
            .emit(CoreEvent::Identity(IdentityEvent::CustomProviderLinked {
                identity_id: snapshot.identity_id().to_string(),
            }));

        Ok(snapshot)
    }

    /// Unlink the custom provider for `user_id`, detaching it remotely first.
    #[instrument(skip(self), fields(provider = %self.provider_id))]
    pub async fn remove_custom_token(&self, user_id: &str) -> Result<IdentitySnapshot> {
        let _guard = self.tokens.lock_mutations().await;

        let current = self.tokens.coordinator().current().await?;
        if !current.is_linked(&self.provider_id) {
            debug!("Custom provider not linked");
            return Ok(current);
        }

        self.exchange
            .detach(user_id, current.identity_id())
            .await
            .map_err(|e| {
                warn!(error = %e, "Custom provider detach failed, keeping local login");
                e
            })?;

        let snapshot = self.tokens.remove_token_locked(&self.provider_id).await?;

        info!(identity_id = %snapshot.identity_id(), "Custom provider unlinked");
        let _ = self
            .event_bus
            .emit(CoreEvent::Identity(IdentityEvent::CustomProviderUnlinked {
                identity_id: snapshot.identity_id().to_string(),
            }));

        Ok(snapshot)
    }
}

impl std::fmt::Debug for CustomProviderBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomProviderBridge")
            .field("provider_id", &self.provider_id)
            .field("identity_pool_id", &self.identity_pool_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::ExchangeResponse;
    use crate::hooks::ChangeHookRegistry;
    use crate::store::CredentialStore;
    use crate::types::IdentityId;
    use crate::RefreshCoordinator;
    use async_trait::async_trait;
    use bridge_traits::LoginMap;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct MemoryStore {
        logins: StdMutex<LoginMap>,
    }

    #[async_trait]
    impl CredentialStore for MemoryStore {
        async fn current_login_map(&self) -> Result<LoginMap> {
            Ok(self.logins.lock().unwrap().clone())
        }

        async fn begin_refresh(&self, logins: LoginMap) -> Result<IdentitySnapshot> {
            *self.logins.lock().unwrap() = logins.clone();
            Ok(IdentitySnapshot::from_logins("id-1", &logins))
        }

        async fn install(&self, identity_id: IdentityId, logins: LoginMap) -> Result<IdentitySnapshot> {
            *self.logins.lock().unwrap() = logins.clone();
            Ok(IdentitySnapshot::from_logins(identity_id, &logins))
        }
    }

    struct FixedExchange;

    #[async_trait]
    impl TokenExchange for FixedExchange {
        async fn exchange(&self, _user_id: &str, _request: ExchangeRequest) -> Result<ExchangeResponse> {
            Ok(ExchangeResponse {
                identity_id: IdentityId::from("id-3"),
                token: "opaque".to_string(),
            })
        }

        async fn detach(&self, _user_id: &str, _identity_id: &IdentityId) -> Result<()> {
            Ok(())
        }
    }

    fn bridge(event_bus: EventBus) -> CustomProviderBridge {
        let coordinator = RefreshCoordinator::new(
            Arc::new(MemoryStore::default()),
            ChangeHookRegistry::new(),
            event_bus.clone(),
        );
        CustomProviderBridge::new(
            "custom-provider",
            "pool-1",
            Arc::new(FixedExchange),
            TokenManager::new(coordinator),
            event_bus,
        )
    }

    #[tokio::test]
    async fn test_link_then_unlink_emits_events() {
        let event_bus = EventBus::new(32);
        let mut events = event_bus.subscribe();
        let bridge = bridge(event_bus);

        let linked = bridge.set_custom_token("user-42").await.unwrap();
        assert_eq!(linked, IdentitySnapshot::new("id-3", ["custom-provider"]));

        let unlinked = bridge.remove_custom_token("user-42").await.unwrap();
        assert!(!unlinked.is_linked("custom-provider"));

        let mut custom_events = Vec::new();
        while let Ok(CoreEvent::Identity(event)) = events.try_recv() {
            if matches!(
                event,
                IdentityEvent::CustomProviderLinked { .. } | IdentityEvent::CustomProviderUnlinked { .. }
            ) {
                custom_events.push(event);
            }
        }
        assert_eq!(
            custom_events,
            vec![
                IdentityEvent::CustomProviderLinked {
                    identity_id: "id-3".to_string()
                },
                IdentityEvent::CustomProviderUnlinked {
                    identity_id: "id-1".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_from_config_requires_custom_provider() {
        let config = IdentityConfig::builder()
            .identity_pool_id("us-east-1:0f8fad5b-d9cb-469f-a165-70867728950e")
            .region("us-east-1")
            .build()
            .unwrap();
        let coordinator = RefreshCoordinator::new(
            Arc::new(MemoryStore::default()),
            ChangeHookRegistry::new(),
            EventBus::default(),
        );

        let result = CustomProviderBridge::from_config(
            &config,
            Arc::new(FixedExchange),
            TokenManager::new(coordinator),
            EventBus::default(),
        );

        assert!(matches!(result, Err(IdentityError::CustomProviderNotConfigured)));
    }
}
