//! Native-bridge backing: every operation is forwarded to the mobile plugin.

use bridge_traits::{actions, BridgeError, IdentityPayload, LoginMap, NativeBridge};
use core_identity::{
    ChangeHookRegistry, ExchangeRequest, IdentityError, IdentityId, IdentitySnapshot,
    Result, TokenExchange,
};
use core_runtime::events::{CoreEvent, EventBus, IdentityEvent};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Custom provider wiring for the native backing.
pub(crate) struct CustomBinding {
    pub provider_id: String,
    pub identity_pool_id: String,
    pub exchange: Arc<dyn TokenExchange>,
}

pub(crate) struct NativeBacking {
    bridge: Arc<dyn NativeBridge>,
    hooks: ChangeHookRegistry,
    event_bus: EventBus,
    custom: Option<CustomBinding>,
    last_identity: Mutex<Option<IdentityId>>,
    mutations: Mutex<()>,
}

impl NativeBacking {
    pub fn new(
        bridge: Arc<dyn NativeBridge>,
        hooks: ChangeHookRegistry,
        event_bus: EventBus,
        custom: Option<CustomBinding>,
    ) -> Self {
        Self {
            bridge,
            hooks,
            event_bus,
            custom,
            last_identity: Mutex::new(None),
            mutations: Mutex::new(()),
        }
    }

    pub async fn identity(&self) -> Result<IdentitySnapshot> {
        self.invoke_identity(actions::GET_IDENTITY, vec![]).await
    }

    #[instrument(skip(self, token))]
    pub async fn set_token(&self, service: &str, token: &str) -> Result<IdentitySnapshot> {
        let _guard = self.mutations.lock().await;
        self.invoke_identity(actions::SET_TOKEN, vec![json!(service), json!(token)])
            .await
    }

    #[instrument(skip(self))]
    pub async fn remove_token(&self, service: &str) -> Result<IdentitySnapshot> {
        let _guard = self.mutations.lock().await;
        self.invoke_identity(actions::REMOVE_TOKEN, vec![json!(service)])
            .await
    }

    #[instrument(skip(self))]
    pub async fn set_custom_token(&self, user_id: &str) -> Result<IdentitySnapshot> {
        let custom = self.custom_binding()?;
        let _guard = self.mutations.lock().await;

        let logins = self.logins().await?;
        if logins.contains_key(&custom.provider_id) {
            debug!("Custom provider already linked");
            return self.identity().await;
        }

        // A fresh identity has no id to send yet.
        let identity_id = if logins.is_empty() {
            None
        } else {
            Some(self.identity().await?.identity_id().clone())
        };
        let request = ExchangeRequest {
            identity_pool_id: custom.identity_pool_id.clone(),
            identity_id,
            logins,
        };
        let response = custom.exchange.exchange(user_id, request).await?;

        // Adopt the minted identity directly; no second refresh.
        let snapshot = self
            .invoke_identity(
                actions::INSTALL_IDENTITY,
                vec![
                    json!(response.identity_id),
                    json!(custom.provider_id),
                    json!(response.token),
                ],
            )
            .await?;

        info!(identity_id = %snapshot.identity_id(), "Custom provider linked");
        self.emit(IdentityEvent::CustomProviderLinked {
            identity_id: snapshot.identity_id().to_string(),
        });
        Ok(snapshot)
    }

    #[instrument(skip(self))]
    pub async fn remove_custom_token(&self, user_id: &str) -> Result<IdentitySnapshot> {
        let custom = self.custom_binding()?;
        let _guard = self.mutations.lock().await;

        let current = self.identity().await?;
        if !current.is_linked(&custom.provider_id) {
            debug!("Custom provider not linked");
            return Ok(current);
        }

        custom.exchange.detach(user_id, current.identity_id()).await?;

        let snapshot = self
            .invoke_identity(actions::REMOVE_TOKEN, vec![json!(custom.provider_id)])
            .await?;

        info!(identity_id = %snapshot.identity_id(), "Custom provider unlinked");
        self.emit(IdentityEvent::CustomProviderUnlinked {
            identity_id: snapshot.identity_id().to_string(),
        });
        Ok(snapshot)
    }

    fn custom_binding(&self) -> Result<&CustomBinding> {
        self.custom
            .as_ref()
            .ok_or(IdentityError::CustomProviderNotConfigured)
    }

    async fn logins(&self) -> Result<LoginMap> {
        let value = self
            .bridge
            .invoke(actions::GET_LOGINS, vec![])
            .await
            .map_err(native_error)?;
        serde_json::from_value(value)
            .map_err(|e| IdentityError::InvalidResponse(format!("Malformed login map: {}", e)))
    }

    async fn invoke_identity(&self, action: &str, args: Vec<Value>) -> Result<IdentitySnapshot> {
        let value = self
            .bridge
            .invoke(action, args)
            .await
            .map_err(native_error)?;

        let payload: IdentityPayload = serde_json::from_value(value).map_err(|e| {
            IdentityError::InvalidResponse(format!("Malformed {} payload: {}", action, e))
        })?;
        let snapshot = IdentitySnapshot::try_from(payload)?;

        self.observe(&snapshot).await;
        Ok(snapshot)
    }

    /// Fire hooks when the plugin reports a different identity id than the
    /// last one seen.
    async fn observe(&self, snapshot: &IdentitySnapshot) {
        let mut last_identity = self.last_identity.lock().await;
        let new_id = snapshot.identity_id();
        let previous = last_identity.replace(new_id.clone());

        let Some(old_id) = previous.filter(|old| old != new_id) else {
            return;
        };

        info!(old_id = %old_id, new_id = %new_id, "Identity id changed");
        self.emit(IdentityEvent::IdentityChanged {
            old_identity_id: old_id.to_string(),
            new_identity_id: new_id.to_string(),
        });

        let report = self.hooks.notify(&old_id, new_id).await;
        for failure in report.failures {
            self.emit(IdentityEvent::HookFailed {
                message: failure.message().to_string(),
            });
        }
    }

    fn emit(&self, event: IdentityEvent) {
        let _ = self.event_bus.emit(CoreEvent::Identity(event));
    }
}

/// Native refresh failures carry the SDK's message verbatim.
fn native_error(error: BridgeError) -> IdentityError {
    match error {
        BridgeError::OperationFailed(message) => {
            warn!(error = %message, "Native identity action failed");
            IdentityError::RefreshFailed(message)
        }
        other => IdentityError::Bridge(other),
    }
}
