//! Command Router
//!
//! Static table from action name to handler. Every accepted invocation runs
//! on its own task and completes with exactly one [`CommandResult`].

use bridge_traits::{
    actions,
    error::{BridgeError, Result},
    CredentialProvider, IdentityPayload, LoginMap,
};
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

/// Handler bound to an action name.
pub type ActionHandler = fn(Arc<PluginContext>, Args) -> BoxFuture<'static, Result<Value>>;

const BUILTIN_ACTIONS: &[(&str, ActionHandler)] = &[
    (actions::GET_IDENTITY, get_identity),
    (actions::SET_TOKEN, set_token),
    (actions::REMOVE_TOKEN, remove_token),
    (actions::GET_LOGINS, get_logins),
    (actions::INSTALL_IDENTITY, install_identity),
];

/// State shared by every handler of one plugin instance.
pub struct PluginContext {
    provider: Arc<dyn CredentialProvider>,
    mutations: Mutex<()>,
}

impl PluginContext {
    pub fn provider(&self) -> &Arc<dyn CredentialProvider> {
        &self.provider
    }
}

/// Positional command arguments.
#[derive(Debug, Clone, Default)]
pub struct Args(Vec<Value>);

impl Args {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// String argument at `index`.
    pub fn string(&self, index: usize) -> Result<String> {
        match self.0.get(index) {
            Some(Value::String(value)) => Ok(value.clone()),
            Some(other) => Err(BridgeError::InvalidArgument {
                index,
                reason: format!("expected a string, got {}", json_kind(other)),
            }),
            None => Err(BridgeError::InvalidArgument {
                index,
                reason: "missing argument".to_string(),
            }),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// The single result of a command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    Success(Value),
    Error(String),
}

/// Handle to an accepted command.
#[derive(Debug)]
pub struct PendingCommand {
    id: Uuid,
    receiver: oneshot::Receiver<CommandResult>,
}

impl PendingCommand {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the command's result.
    pub async fn result(self) -> CommandResult {
        self.receiver.await.unwrap_or_else(|_| {
            CommandResult::Error("command terminated without a result".to_string())
        })
    }
}

/// Outcome of routing an action name.
#[derive(Debug)]
pub enum Dispatch {
    Handled(PendingCommand),
    /// No handler for the action; nothing was invoked.
    NotHandled,
}

/// Routes named actions to handlers over one credential provider.
pub struct CommandRouter {
    context: Arc<PluginContext>,
    handlers: HashMap<&'static str, ActionHandler>,
}

impl CommandRouter {
    /// Router with the identity actions registered.
    pub fn new(provider: Arc<dyn CredentialProvider>) -> Result<Self> {
        let mut router = Self {
            context: Arc::new(PluginContext {
                provider,
                mutations: Mutex::new(()),
            }),
            handlers: HashMap::new(),
        };

        for &(name, handler) in BUILTIN_ACTIONS {
            router.register(name, handler)?;
        }

        Ok(router)
    }

    /// Bind `handler` to `name`.
    ///
    /// # Errors
    ///
    /// Fails when `name` is already bound.
    pub fn register(&mut self, name: &'static str, handler: ActionHandler) -> Result<()> {
        if self.handlers.contains_key(name) {
            return Err(BridgeError::OperationFailed(format!(
                "Action {} is already registered",
                name
            )));
        }
        self.handlers.insert(name, handler);
        Ok(())
    }

    pub fn handles(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    /// Start `action` with `args`.
    ///
    /// Must be called within a Tokio runtime.
    pub fn execute(&self, action: &str, args: Vec<Value>) -> Dispatch {
        let Some(handler) = self.handlers.get(action).copied() else {
            debug!(action, "Action not handled");
            return Dispatch::NotHandled;
        };

        let id = Uuid::new_v4();
        let (sender, receiver) = oneshot::channel();
        let context = self.context.clone();
        let span = info_span!("command", action, command_id = %id);

        tokio::spawn(
            async move {
                let result = match handler(context, Args::new(args)).await {
                    Ok(value) => CommandResult::Success(value),
                    Err(error) => {
                        warn!(error = %error, "Command failed");
                        CommandResult::Error(error_message(error))
                    }
                };
                if sender.send(result).is_err() {
                    debug!("Command result dropped by caller");
                }
            }
            .instrument(span),
        );

        Dispatch::Handled(PendingCommand { id, receiver })
    }
}

impl fmt::Debug for CommandRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut actions: Vec<_> = self.handlers.keys().collect();
        actions.sort();
        f.debug_struct("CommandRouter")
            .field("actions", &actions)
            .finish_non_exhaustive()
    }
}

/// Native failures are reported verbatim.
fn error_message(error: BridgeError) -> String {
    match error {
        BridgeError::OperationFailed(message) => message,
        other => other.to_string(),
    }
}

/// Payload for the cached identity; a provider that never resolved one
/// refreshes first.
async fn identity_payload(provider: &dyn CredentialProvider, logins: &LoginMap) -> Result<Value> {
    let identity_id = match provider.identity_id().await? {
        Some(identity_id) => identity_id,
        None => {
            debug!("No cached identity id, refreshing");
            provider.refresh().await?
        }
    };

    payload(identity_id, logins)
}

fn payload(identity_id: String, logins: &LoginMap) -> Result<Value> {
    Ok(serde_json::to_value(IdentityPayload {
        identity_id,
        services: logins.keys().cloned().collect(),
    })?)
}

async fn refreshed_payload(provider: &dyn CredentialProvider, logins: LoginMap) -> Result<Value> {
    provider.set_logins(logins.clone()).await?;
    let identity_id = provider.refresh().await?;
    payload(identity_id, &logins)
}

fn get_identity(context: Arc<PluginContext>, _args: Args) -> BoxFuture<'static, Result<Value>> {
    Box::pin(async move {
        let _guard = context.mutations.lock().await;
        let logins = context.provider.logins().await?;
        identity_payload(context.provider.as_ref(), &logins).await
    })
}

fn set_token(context: Arc<PluginContext>, args: Args) -> BoxFuture<'static, Result<Value>> {
    Box::pin(async move {
        let service = args.string(0)?;
        let token = args.string(1)?;

        let _guard = context.mutations.lock().await;
        let mut logins = context.provider.logins().await?;
        if logins.contains_key(&service) {
            debug!(service = %service, "Service already linked");
            return identity_payload(context.provider.as_ref(), &logins).await;
        }

        logins.insert(service, token);
        refreshed_payload(context.provider.as_ref(), logins).await
    })
}

fn remove_token(context: Arc<PluginContext>, args: Args) -> BoxFuture<'static, Result<Value>> {
    Box::pin(async move {
        let service = args.string(0)?;

        let _guard = context.mutations.lock().await;
        let mut logins = context.provider.logins().await?;
        if logins.remove(&service).is_none() {
            debug!(service = %service, "Service not linked");
            return identity_payload(context.provider.as_ref(), &logins).await;
        }

        refreshed_payload(context.provider.as_ref(), logins).await
    })
}

fn get_logins(context: Arc<PluginContext>, _args: Args) -> BoxFuture<'static, Result<Value>> {
    Box::pin(async move {
        let logins = context.provider.logins().await?;
        Ok(serde_json::to_value(logins)?)
    })
}

fn install_identity(context: Arc<PluginContext>, args: Args) -> BoxFuture<'static, Result<Value>> {
    Box::pin(async move {
        let identity_id = args.string(0)?;
        let service = args.string(1)?;
        let token = args.string(2)?;

        let _guard = context.mutations.lock().await;
        let mut logins = context.provider.logins().await?;
        logins.insert(service, token);
        context
            .provider
            .install_identity(identity_id.clone(), logins.clone())
            .await?;

        payload(identity_id, &logins)
    })
}
