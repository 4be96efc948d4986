//! Native Command Bridge
//!
//! Mobile shells expose the native identity SDK through a command bridge:
//! a named action invoked with positional arguments that completes with
//! exactly one success value or one error message.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Action names understood by the mobile plugins.
pub mod actions {
    pub const GET_IDENTITY: &str = "getIdentity";
    pub const SET_TOKEN: &str = "setToken";
    pub const REMOVE_TOKEN: &str = "removeToken";
    pub const GET_LOGINS: &str = "getLogins";
    /// Adopt an externally minted identity id and link one service to it.
    pub const INSTALL_IDENTITY: &str = "installIdentity";
}

/// Success payload of the identity actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityPayload {
    pub identity_id: String,
    pub services: Vec<String>,
}

/// Command bridge into a native plugin.
///
/// An action that the plugin does not handle fails with
/// [`BridgeError::NotAvailable`](crate::BridgeError::NotAvailable) and
/// never reaches native code.
#[async_trait]
pub trait NativeBridge: Send + Sync {
    /// Invoke `action` with positional arguments and wait for its single result.
    async fn invoke(&self, action: &str, args: Vec<Value>) -> Result<Value>;
}
