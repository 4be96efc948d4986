//! In-process [`NativeBridge`] over a [`CommandRouter`].

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    CredentialProvider, NativeBridge,
};
use serde_json::Value;
use std::sync::Arc;

use crate::router::{CommandResult, CommandRouter, Dispatch};

/// Command bridge that routes invocations straight into a plugin router.
///
/// Unknown actions fail with [`BridgeError::NotAvailable`]; native error
/// messages surface as [`BridgeError::OperationFailed`].
#[derive(Debug)]
pub struct PluginBridge {
    router: CommandRouter,
}

impl PluginBridge {
    pub fn new(router: CommandRouter) -> Self {
        Self { router }
    }

    /// Bridge over a router with the identity actions registered.
    pub fn for_provider(provider: Arc<dyn CredentialProvider>) -> Result<Self> {
        Ok(Self::new(CommandRouter::new(provider)?))
    }

    pub fn router(&self) -> &CommandRouter {
        &self.router
    }
}

#[async_trait]
impl NativeBridge for PluginBridge {
    async fn invoke(&self, action: &str, args: Vec<Value>) -> Result<Value> {
        match self.router.execute(action, args) {
            Dispatch::NotHandled => Err(BridgeError::NotAvailable(format!(
                "Action {} is not handled by this plugin",
                action
            ))),
            Dispatch::Handled(command) => match command.result().await {
                CommandResult::Success(value) => Ok(value),
                CommandResult::Error(message) => Err(BridgeError::OperationFailed(message)),
            },
        }
    }
}
