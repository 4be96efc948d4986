//! # Mobile Bridge Implementations
//!
//! Plugin shim shared by the iOS and Android shells.
//!
//! ## Overview
//!
//! The mobile shells hold the native identity SDK's credential provider and
//! expose it through a command bridge: named actions with positional string
//! arguments, each completing with one success payload or one error message.
//! This crate implements that surface on top of a host-supplied
//! [`CredentialProvider`](bridge_traits::CredentialProvider):
//! - [`CommandRouter`] dispatches the `getIdentity`, `setToken`,
//!   `removeToken`, `getLogins` and `installIdentity` actions
//! - [`PluginBridge`] implements [`NativeBridge`](bridge_traits::NativeBridge)
//!   in-process so the core can drive the plugin directly
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_mobile::{CommandResult, CommandRouter, Dispatch};
//! use serde_json::json;
//!
//! let router = CommandRouter::new(provider)?;
//! if let Dispatch::Handled(command) = router.execute("setToken", vec![json!("google"), json!(id_token)]) {
//!     match command.result().await {
//!         CommandResult::Success(payload) => println!("{payload}"),
//!         CommandResult::Error(message) => eprintln!("{message}"),
//!     }
//! }
//! ```

mod bridge;
mod router;

pub use bridge::PluginBridge;
pub use router::{
    ActionHandler, Args, CommandResult, CommandRouter, Dispatch, PendingCommand, PluginContext,
};
