//! Integration tests for the mobile command surface
//!
//! These tests verify:
//! - Success payloads and error messages of each action
//! - The per-service no-op state machine
//! - Rejection of unknown actions without touching the provider
//! - Exactly one result per accepted command

use async_trait::async_trait;
use bridge_mobile::{Args, CommandResult, CommandRouter, Dispatch, PluginBridge, PluginContext};
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::{CredentialProvider, LoginMap, NativeBridge};
use futures::future::BoxFuture;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeProvider {
    identity_id: Mutex<Option<String>>,
    logins: Mutex<LoginMap>,
    calls: Mutex<Vec<&'static str>>,
    refresh_error: Mutex<Option<String>>,
}

impl FakeProvider {
    fn with_identity(identity_id: &str) -> Arc<Self> {
        let provider = Self::default();
        *provider.identity_id.lock().unwrap() = Some(identity_id.to_string());
        Arc::new(provider)
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn mutating_calls(&self) -> usize {
        self.calls()
            .into_iter()
            .filter(|call| matches!(*call, "set_logins" | "refresh"))
            .count()
    }
}

#[async_trait]
impl CredentialProvider for FakeProvider {
    async fn identity_id(&self) -> Result<Option<String>> {
        self.calls.lock().unwrap().push("identity_id");
        Ok(self.identity_id.lock().unwrap().clone())
    }

    async fn logins(&self) -> Result<LoginMap> {
        self.calls.lock().unwrap().push("logins");
        Ok(self.logins.lock().unwrap().clone())
    }

    async fn set_logins(&self, logins: LoginMap) -> Result<()> {
        self.calls.lock().unwrap().push("set_logins");
        *self.logins.lock().unwrap() = logins;
        Ok(())
    }

    async fn refresh(&self) -> Result<String> {
        self.calls.lock().unwrap().push("refresh");
        if let Some(message) = self.refresh_error.lock().unwrap().take() {
            return Err(BridgeError::OperationFailed(message));
        }
        let mut identity_id = self.identity_id.lock().unwrap();
        Ok(identity_id.get_or_insert_with(|| "id-1".to_string()).clone())
    }

    async fn install_identity(&self, identity_id: String, logins: LoginMap) -> Result<()> {
        self.calls.lock().unwrap().push("install_identity");
        *self.identity_id.lock().unwrap() = Some(identity_id);
        *self.logins.lock().unwrap() = logins;
        Ok(())
    }
}

async fn run(router: &CommandRouter, action: &str, args: Vec<Value>) -> CommandResult {
    match router.execute(action, args) {
        Dispatch::Handled(command) => command.result().await,
        Dispatch::NotHandled => panic!("{action} not handled"),
    }
}

#[tokio::test]
async fn test_set_token_links_and_refreshes() {
    let provider = Arc::new(FakeProvider::default());
    let router = CommandRouter::new(provider.clone()).unwrap();

    let result = run(&router, "setToken", vec![json!("google"), json!("tok1")]).await;

    assert_eq!(
        result,
        CommandResult::Success(json!({ "identityId": "id-1", "services": ["google"] }))
    );
    assert_eq!(
        provider.logins.lock().unwrap().get("google").map(String::as_str),
        Some("tok1")
    );
}

#[tokio::test]
async fn test_set_token_when_linked_is_noop() {
    let provider = FakeProvider::with_identity("id-1");
    provider
        .logins
        .lock()
        .unwrap()
        .insert("google".to_string(), "tok1".to_string());
    let router = CommandRouter::new(provider.clone()).unwrap();

    let result = run(&router, "setToken", vec![json!("google"), json!("tok2")]).await;

    assert_eq!(
        result,
        CommandResult::Success(json!({ "identityId": "id-1", "services": ["google"] }))
    );
    assert_eq!(provider.mutating_calls(), 0);
    assert_eq!(
        provider.logins.lock().unwrap().get("google").map(String::as_str),
        Some("tok1")
    );
}

#[tokio::test]
async fn test_remove_token_absent_is_noop_and_present_refreshes() {
    let provider = FakeProvider::with_identity("id-1");
    provider
        .logins
        .lock()
        .unwrap()
        .insert("google".to_string(), "tok1".to_string());
    let router = CommandRouter::new(provider.clone()).unwrap();

    let absent = run(&router, "removeToken", vec![json!("facebook")]).await;
    assert_eq!(
        absent,
        CommandResult::Success(json!({ "identityId": "id-1", "services": ["google"] }))
    );
    assert_eq!(provider.mutating_calls(), 0);

    let removed = run(&router, "removeToken", vec![json!("google")]).await;
    assert_eq!(
        removed,
        CommandResult::Success(json!({ "identityId": "id-1", "services": [] }))
    );
    assert_eq!(provider.mutating_calls(), 2);
}

#[tokio::test]
async fn test_get_identity_on_fresh_provider_refreshes() {
    let provider = Arc::new(FakeProvider::default());
    let router = CommandRouter::new(provider.clone()).unwrap();

    let result = run(&router, "getIdentity", vec![]).await;

    assert_eq!(
        result,
        CommandResult::Success(json!({ "identityId": "id-1", "services": [] }))
    );
    assert_eq!(provider.calls(), vec!["logins", "identity_id", "refresh"]);

    // The resolved id is cached; no second refresh.
    run(&router, "getIdentity", vec![]).await;
    assert_eq!(provider.mutating_calls(), 1);
}

#[tokio::test]
async fn test_get_identity_refresh_failure_is_reported() {
    let provider = Arc::new(FakeProvider::default());
    *provider.refresh_error.lock().unwrap() = Some("NetworkError".to_string());
    let router = CommandRouter::new(provider).unwrap();

    let result = run(&router, "getIdentity", vec![]).await;

    assert_eq!(result, CommandResult::Error("NetworkError".to_string()));
}

#[tokio::test]
async fn test_install_identity_adopts_minted_id() {
    let provider = FakeProvider::with_identity("id-1");
    provider
        .logins
        .lock()
        .unwrap()
        .insert("google".to_string(), "tok1".to_string());
    let router = CommandRouter::new(provider.clone()).unwrap();

    let result = run(
        &router,
        "installIdentity",
        vec![json!("id-3"), json!("custom-provider"), json!("opaque")],
    )
    .await;

    assert_eq!(
        result,
        CommandResult::Success(json!({
            "identityId": "id-3",
            "services": ["custom-provider", "google"]
        }))
    );
    assert_eq!(provider.identity_id.lock().unwrap().as_deref(), Some("id-3"));
    assert_eq!(
        provider.logins.lock().unwrap().get("custom-provider").map(String::as_str),
        Some("opaque")
    );
    assert!(!provider.calls().contains(&"refresh"));
}

#[tokio::test]
async fn test_install_identity_requires_all_arguments() {
    let provider = Arc::new(FakeProvider::default());
    let router = CommandRouter::new(provider.clone()).unwrap();

    let result = run(&router, "installIdentity", vec![json!("id-3"), json!("custom-provider")]).await;

    match result {
        CommandResult::Error(message) => assert!(message.contains("position 2")),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn test_refresh_error_is_reported_verbatim() {
    let provider = FakeProvider::with_identity("id-1");
    *provider.refresh_error.lock().unwrap() = Some("NotAuthorizedException".to_string());
    let router = CommandRouter::new(provider).unwrap();

    let result = run(&router, "setToken", vec![json!("google"), json!("bad")]).await;

    assert_eq!(result, CommandResult::Error("NotAuthorizedException".to_string()));
}

#[tokio::test]
async fn test_missing_argument_fails_action() {
    let provider = Arc::new(FakeProvider::default());
    let router = CommandRouter::new(provider.clone()).unwrap();

    let result = run(&router, "setToken", vec![json!("google")]).await;

    match result {
        CommandResult::Error(message) => assert!(message.contains("position 1")),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn test_unknown_action_is_not_handled() {
    let provider = Arc::new(FakeProvider::default());
    let router = CommandRouter::new(provider.clone()).unwrap();

    assert!(matches!(
        router.execute("deleteEverything", vec![]),
        Dispatch::NotHandled
    ));
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn test_get_logins_returns_map() {
    let provider = FakeProvider::with_identity("id-1");
    provider
        .logins
        .lock()
        .unwrap()
        .insert("google".to_string(), "tok1".to_string());
    let router = CommandRouter::new(provider).unwrap();

    let result = run(&router, "getLogins", vec![]).await;

    assert_eq!(result, CommandResult::Success(json!({ "google": "tok1" })));
}

fn echo(_context: Arc<PluginContext>, args: Args) -> BoxFuture<'static, Result<Value>> {
    Box::pin(async move { Ok(json!(args.len())) })
}

#[tokio::test]
async fn test_register_rejects_duplicates() {
    let provider = Arc::new(FakeProvider::default());
    let mut router = CommandRouter::new(provider).unwrap();

    assert!(router.register("getIdentity", echo).is_err());

    router.register("echo", echo).unwrap();
    assert!(router.handles("echo"));
    assert_eq!(
        run(&router, "echo", vec![json!(1), json!(2)]).await,
        CommandResult::Success(json!(2))
    );
}

#[tokio::test]
async fn test_commands_have_distinct_ids() {
    let provider = FakeProvider::with_identity("id-1");
    let router = CommandRouter::new(provider).unwrap();

    let (Dispatch::Handled(a), Dispatch::Handled(b)) = (
        router.execute("getIdentity", vec![]),
        router.execute("getIdentity", vec![]),
    ) else {
        panic!("getIdentity not handled");
    };

    assert_ne!(a.id(), b.id());
    assert!(matches!(a.result().await, CommandResult::Success(_)));
    assert!(matches!(b.result().await, CommandResult::Success(_)));
}

#[tokio::test]
async fn test_plugin_bridge_maps_results() {
    let provider = FakeProvider::with_identity("id-1");
    let bridge = PluginBridge::for_provider(provider).unwrap();

    let payload = bridge
        .invoke("setToken", vec![json!("google"), json!("tok1")])
        .await
        .unwrap();
    assert_eq!(payload, json!({ "identityId": "id-1", "services": ["google"] }));

    assert!(matches!(
        bridge.invoke("unknown", vec![]).await,
        Err(BridgeError::NotAvailable(_))
    ));
    assert!(matches!(
        bridge.invoke("removeToken", vec![]).await,
        Err(BridgeError::OperationFailed(_))
    ));
}
