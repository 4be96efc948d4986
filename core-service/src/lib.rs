//! Client façade and bootstrap helpers.
//!
//! This crate wires host-provided bridges into the identity core and exposes
//! one [`IdentityClient`] to applications. Two backings exist:
//!
//! - **Native**: a [`NativeBridge`] into the mobile plugin owns the
//!   credential provider; every operation is forwarded as a command.
//! - **Web**: an in-process [`CredentialStore`] driven through the
//!   [`RefreshCoordinator`](core_identity::RefreshCoordinator).
//!
//! The native bridge wins when both are supplied. Desktop apps enable the
//! `desktop-shims` feature (backed by `bridge-desktop`) to get a default
//! HTTP client for the custom provider's token exchange; mobile hosts enable
//! `mobile` to build the plugin bridge from a credential provider.
//!
//! ```ignore
//! use core_runtime::config::IdentityConfig;
//! use core_service::{ClientDependencies, IdentityClient};
//!
//! let config = IdentityConfig::from_env()?;
//! let client = IdentityClient::new(
//!     ClientDependencies::new(config).with_credential_provider(provider),
//! )?;
//! let snapshot = client.set_token("google", &id_token).await?;
//! ```

pub mod error;
mod native;
mod web;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{http::HttpClient, CredentialProvider, NativeBridge};
use core_identity::{
    ChangeHook, ChangeHookRegistry, CredentialStore, CustomProviderBridge, HttpTokenExchange,
    IdentitySnapshot, ProviderCredentialStore, RefreshCoordinator, TokenExchange, TokenManager,
};
use core_runtime::config::IdentityConfig;
use core_runtime::events::{EventBus, EventStream};
use tracing::{debug, info};

use native::{CustomBinding, NativeBacking};
use web::WebBacking;

/// Host-supplied collaborators for an [`IdentityClient`].
pub struct ClientDependencies {
    pub config: IdentityConfig,
    pub native_bridge: Option<Arc<dyn NativeBridge>>,
    pub credential_store: Option<Arc<dyn CredentialStore>>,
    pub token_exchange: Option<Arc<dyn TokenExchange>>,
    pub http_client: Option<Arc<dyn HttpClient>>,
    pub hooks: ChangeHookRegistry,
    pub event_bus: Option<EventBus>,
}

impl ClientDependencies {
    pub fn new(config: IdentityConfig) -> Self {
        Self {
            config,
            native_bridge: None,
            credential_store: None,
            token_exchange: None,
            http_client: None,
            hooks: ChangeHookRegistry::new(),
            event_bus: None,
        }
    }

    pub fn with_native_bridge(mut self, bridge: Arc<dyn NativeBridge>) -> Self {
        self.native_bridge = Some(bridge);
        self
    }

    pub fn with_credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credential_store = Some(store);
        self
    }

    /// In-process backing over the identity SDK's credential provider.
    pub fn with_credential_provider(self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.with_credential_store(Arc::new(ProviderCredentialStore::new(provider)))
    }

    /// Native backing through the plugin bridge built over `provider`.
    #[cfg(feature = "mobile")]
    pub fn with_plugin_provider(self, provider: Arc<dyn CredentialProvider>) -> Result<Self> {
        let bridge = bridge_mobile::PluginBridge::for_provider(provider)
            .map_err(|e| CoreError::InitializationFailed(e.to_string()))?;
        Ok(self.with_native_bridge(Arc::new(bridge)))
    }

    pub fn with_token_exchange(mut self, exchange: Arc<dyn TokenExchange>) -> Self {
        self.token_exchange = Some(exchange);
        self
    }

    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    pub fn with_hooks(mut self, hooks: ChangeHookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }
}

/// Which backing an [`IdentityClient`] was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackingKind {
    Native,
    Web,
}

enum Backing {
    Native(NativeBacking),
    Web(WebBacking),
}

/// Primary façade exposed to host applications.
///
/// Cloning is cheap; clones share the backing, hooks and event bus.
#[derive(Clone)]
pub struct IdentityClient {
    backing: Arc<Backing>,
    hooks: ChangeHookRegistry,
    event_bus: EventBus,
}

impl IdentityClient {
    /// Build a client from `deps`.
    ///
    /// # Errors
    ///
    /// - `Runtime` when the configuration is invalid
    /// - `CapabilityMissing` when neither a native bridge nor a credential
    ///   store is supplied, or when a custom provider is configured but no
    ///   token exchange can be built
    pub fn new(deps: ClientDependencies) -> Result<Self> {
        let ClientDependencies {
            config,
            native_bridge,
            credential_store,
            token_exchange,
            http_client,
            hooks,
            event_bus,
        } = deps;

        config.validate()?;

        let event_bus = event_bus.unwrap_or_else(|| EventBus::new(config.event_buffer_size));
        let exchange = resolve_exchange(&config, token_exchange, http_client)?;

        let backing = if let Some(bridge) = native_bridge {
            info!("Using native identity backing");
            let custom = match (config.custom_provider_id(), exchange) {
                (Some(provider_id), Some(exchange)) => Some(CustomBinding {
                    provider_id: provider_id.to_string(),
                    identity_pool_id: config.identity_pool_id.clone(),
                    exchange,
                }),
                _ => None,
            };
            Backing::Native(NativeBacking::new(
                bridge,
                hooks.clone(),
                event_bus.clone(),
                custom,
            ))
        } else {
            let store = credential_store.ok_or_else(|| CoreError::CapabilityMissing {
                capability: "CredentialStore".to_string(),
                message: "Supply a native bridge or a credential store".to_string(),
            })?;
            info!("Using in-process identity backing");

            let coordinator = RefreshCoordinator::new(store, hooks.clone(), event_bus.clone());
            let tokens = TokenManager::new(coordinator);
            let custom = exchange
                .map(|exchange| {
                    CustomProviderBridge::from_config(
                        &config,
                        exchange,
                        tokens.clone(),
                        event_bus.clone(),
                    )
                })
                .transpose()?;
            Backing::Web(WebBacking::new(tokens, custom))
        };

        Ok(Self {
            backing: Arc::new(backing),
            hooks,
            event_bus,
        })
    }

    pub fn backing_kind(&self) -> BackingKind {
        match self.backing.as_ref() {
            Backing::Native(_) => BackingKind::Native,
            Backing::Web(_) => BackingKind::Web,
        }
    }

    /// Current identity, refreshing first when none has been resolved.
    pub async fn identity(&self) -> Result<IdentitySnapshot> {
        let snapshot = match self.backing.as_ref() {
            Backing::Native(native) => native.identity().await?,
            Backing::Web(web) => web.identity().await?,
        };
        Ok(snapshot)
    }

    /// Link `service` with `token`; a no-op when it is already linked.
    pub async fn set_token(&self, service: &str, token: &str) -> Result<IdentitySnapshot> {
        let snapshot = match self.backing.as_ref() {
            Backing::Native(native) => native.set_token(service, token).await?,
            Backing::Web(web) => web.tokens().set_token(service, token).await?,
        };
        Ok(snapshot)
    }

    /// Unlink `service`; a no-op when it is not linked.
    pub async fn remove_token(&self, service: &str) -> Result<IdentitySnapshot> {
        let snapshot = match self.backing.as_ref() {
            Backing::Native(native) => native.remove_token(service).await?,
            Backing::Web(web) => web.tokens().remove_token(service).await?,
        };
        Ok(snapshot)
    }

    /// Link the developer-authenticated provider for `user_id`.
    pub async fn set_custom_token(&self, user_id: &str) -> Result<IdentitySnapshot> {
        let snapshot = match self.backing.as_ref() {
            Backing::Native(native) => native.set_custom_token(user_id).await?,
            Backing::Web(web) => web.custom()?.set_custom_token(user_id).await?,
        };
        Ok(snapshot)
    }

    /// Detach `user_id` remotely, then unlink the developer-authenticated
    /// provider.
    pub async fn remove_custom_token(&self, user_id: &str) -> Result<IdentitySnapshot> {
        let snapshot = match self.backing.as_ref() {
            Backing::Native(native) => native.remove_custom_token(user_id).await?,
            Backing::Web(web) => web.custom()?.remove_custom_token(user_id).await?,
        };
        Ok(snapshot)
    }

    pub fn hooks(&self) -> &ChangeHookRegistry {
        &self.hooks
    }

    /// Register a hook fired whenever the identity id changes.
    pub fn add_change_hook<H>(&self, hook: H)
    where
        H: ChangeHook + 'static,
    {
        self.hooks.register(hook);
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Stream of identity events emitted after this call.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }
}

/// Token exchange for the configured custom provider, if any.
fn resolve_exchange(
    config: &IdentityConfig,
    injected: Option<Arc<dyn TokenExchange>>,
    http_client: Option<Arc<dyn HttpClient>>,
) -> Result<Option<Arc<dyn TokenExchange>>> {
    let Some(custom) = config.custom_provider.as_ref() else {
        if injected.is_some() {
            debug!("Ignoring token exchange: no custom provider configured");
        }
        return Ok(None);
    };

    if let Some(exchange) = injected {
        return Ok(Some(exchange));
    }

    let http_client = match http_client {
        Some(client) => client,
        None => default_http_client()?,
    };
    let exchange = HttpTokenExchange::new(http_client, &custom.remote_function)?;
    Ok(Some(Arc::new(exchange)))
}

#[cfg(feature = "desktop-shims")]
fn default_http_client() -> Result<Arc<dyn HttpClient>> {
    let client = bridge_desktop::ReqwestHttpClient::new()
        .map_err(|e| CoreError::InitializationFailed(e.to_string()))?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(CoreError::CapabilityMissing {
        capability: "TokenExchange".to_string(),
        message: "A custom provider is configured; supply a token exchange or an HTTP client"
            .to_string(),
    })
}
