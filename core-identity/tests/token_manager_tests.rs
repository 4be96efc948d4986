//! Integration tests for linking and unlinking login tokens
//!
//! These tests verify:
//! - The link/unlink walkthrough from an empty login map
//! - No-op mutations performing zero store calls
//! - Failed refreshes surfacing to the caller
//! - End-to-end behaviour over a platform credential provider

mod common;

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::{CredentialProvider, LoginMap};
use common::{logins, FakeStore, HookLog, Harness};
use core_identity::{
    ChangeHookRegistry, IdentityError, IdentitySnapshot, ProviderCredentialStore,
    RefreshCoordinator, TokenManager,
};
use core_runtime::events::EventBus;
use std::sync::{Arc, Mutex};

#[tokio::test]
async fn test_link_unlink_walkthrough() {
    let store = FakeStore::new(&["id-1", "id-1", "id-2"]);
    let harness = Harness::new(store.clone());
    let log = HookLog::default();
    log.register(&harness.hooks);

    let linked = harness.tokens.set_token("google", "tok1").await.unwrap();
    assert_eq!(linked, IdentitySnapshot::new("id-1", ["google"]));

    let again = harness.tokens.set_token("google", "tok2").await.unwrap();
    assert_eq!(again, linked);
    assert_eq!(store.logins(), logins(&[("google", "tok1")]));

    let absent = harness.tokens.remove_token("facebook").await.unwrap();
    assert_eq!(absent, linked);

    let unlinked = harness.tokens.remove_token("google").await.unwrap();
    assert_eq!(unlinked, IdentitySnapshot::new("id-2", Vec::<String>::new()));

    assert_eq!(log.calls(), vec![("id-1".to_string(), "id-2".to_string())]);
}

#[tokio::test]
async fn test_noop_mutations_perform_zero_store_calls() {
    let store = FakeStore::new(&["id-1", "id-1"]);
    let harness = Harness::new(store.clone());

    harness.tokens.set_token("google", "tok1").await.unwrap();
    let calls = store.refresh_count();

    harness.tokens.set_token("google", "tok2").await.unwrap();
    harness.tokens.remove_token("facebook").await.unwrap();

    assert_eq!(store.refresh_count(), calls);
    assert!(store.installs().is_empty());
}

#[tokio::test]
async fn test_failed_refresh_is_not_masked() {
    let store = FakeStore::scripted(vec![
        Ok("id-1".to_string()),
        Err("invalid login token".to_string()),
    ]);
    let harness = Harness::new(store);

    let result = harness.tokens.set_token("google", "bad").await;

    match result {
        Err(IdentityError::RefreshFailed(message)) => assert_eq!(message, "invalid login token"),
        other => panic!("expected refresh failure, got {other:?}"),
    }

    let identity = harness.tokens.identity().await.unwrap();
    assert!(!identity.is_linked("google"));
}

#[tokio::test]
async fn test_identity_triggers_refresh_when_none_ran() {
    let store = FakeStore::new(&["id-1"]);
    let harness = Harness::new(store.clone());

    let identity = harness.tokens.identity().await.unwrap();

    assert_eq!(identity.identity_id().as_str(), "id-1");
    assert_eq!(store.refresh_count(), 1);
}

/// Credential provider minting a new identity id whenever the login set
/// loses every provider, like an anonymous identity being replaced.
#[derive(Default)]
struct FakeProvider {
    state: Mutex<ProviderState>,
}

#[derive(Default)]
struct ProviderState {
    identity_id: Option<String>,
    logins: LoginMap,
    minted: usize,
    fail_next: bool,
}

#[async_trait]
impl CredentialProvider for FakeProvider {
    async fn identity_id(&self) -> BridgeResult<Option<String>> {
        Ok(self.state.lock().unwrap().identity_id.clone())
    }

    async fn logins(&self) -> BridgeResult<LoginMap> {
        Ok(self.state.lock().unwrap().logins.clone())
    }

    async fn set_logins(&self, logins: LoginMap) -> BridgeResult<()> {
        self.state.lock().unwrap().logins = logins;
        Ok(())
    }

    async fn refresh(&self) -> BridgeResult<String> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next {
            state.fail_next = false;
            return Err(BridgeError::OperationFailed("NotAuthorizedException".to_string()));
        }
        if state.identity_id.is_none() || state.logins.is_empty() {
            state.minted += 1;
            state.identity_id = Some(format!("id-{}", state.minted));
        }
        Ok(state.identity_id.clone().unwrap_or_default())
    }

    async fn install_identity(&self, identity_id: String, logins: LoginMap) -> BridgeResult<()> {
        let mut state = self.state.lock().unwrap();
        state.identity_id = Some(identity_id);
        state.logins = logins;
        Ok(())
    }
}

#[tokio::test]
async fn test_provider_backed_store_end_to_end() {
    let provider = Arc::new(FakeProvider::default());
    let coordinator = RefreshCoordinator::new(
        Arc::new(ProviderCredentialStore::new(provider.clone())),
        ChangeHookRegistry::new(),
        EventBus::default(),
    );
    let tokens = TokenManager::new(coordinator);

    let linked = tokens.set_token("google", "tok-g").await.unwrap();
    assert_eq!(linked, IdentitySnapshot::new("id-1", ["google"]));
    assert_eq!(provider.logins().await.unwrap(), logins(&[("google", "tok-g")]));

    provider.state.lock().unwrap().fail_next = true;
    let err = tokens.set_token("facebook", "tok-f").await.unwrap_err();
    assert!(err.to_string().contains("NotAuthorizedException"));
    assert_eq!(tokens.identity().await.unwrap(), linked);

    let retried = tokens.set_token("facebook", "tok-f").await.unwrap();
    assert_eq!(retried, IdentitySnapshot::new("id-1", ["facebook", "google"]));

    tokens.remove_token("google").await.unwrap();
    let unlinked = tokens.remove_token("facebook").await.unwrap();
    assert_eq!(unlinked, IdentitySnapshot::new("id-2", Vec::<String>::new()));
}
