//! Shared fakes for the identity integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::LoginMap;
use core_identity::{
    ChangeHookRegistry, CredentialStore, IdentityError, IdentityId, IdentitySnapshot,
    RefreshCoordinator, Result, TokenManager,
};
use core_runtime::events::EventBus;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Credential store answering refreshes from a script of identity ids.
///
/// Every `begin_refresh` is recorded. When gated, a refresh blocks until the
/// test releases a permit, which makes the in-flight window observable.
pub struct FakeStore {
    script: Mutex<VecDeque<std::result::Result<String, String>>>,
    logins: Mutex<LoginMap>,
    refreshes: Mutex<Vec<LoginMap>>,
    installs: Mutex<Vec<(IdentityId, LoginMap)>>,
    gate: Option<Semaphore>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeStore {
    pub fn new(ids: &[&str]) -> Arc<Self> {
        Self::scripted(ids.iter().map(|id| Ok(id.to_string())).collect())
    }

    pub fn scripted(script: Vec<std::result::Result<String, String>>) -> Arc<Self> {
        Arc::new(Self::build(script, None))
    }

    /// Store whose refreshes wait for [`release`](Self::release).
    pub fn gated(ids: &[&str]) -> Arc<Self> {
        Arc::new(Self::build(
            ids.iter().map(|id| Ok(id.to_string())).collect(),
            Some(Semaphore::new(0)),
        ))
    }

    fn build(script: Vec<std::result::Result<String, String>>, gate: Option<Semaphore>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            logins: Mutex::new(LoginMap::new()),
            refreshes: Mutex::new(Vec::new()),
            installs: Mutex::new(Vec::new()),
            gate,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.lock().unwrap().len()
    }

    pub fn refreshed_logins(&self) -> Vec<LoginMap> {
        self.refreshes.lock().unwrap().clone()
    }

    pub fn installs(&self) -> Vec<(IdentityId, LoginMap)> {
        self.installs.lock().unwrap().clone()
    }

    pub fn logins(&self) -> LoginMap {
        self.logins.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Wait until `count` refreshes have reached the store.
    pub async fn wait_for_refreshes(&self, count: usize) {
        for _ in 0..200 {
            if self.refresh_count() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "expected {count} refreshes, saw {}",
            self.refresh_count()
        );
    }
}

#[async_trait]
impl CredentialStore for FakeStore {
    async fn current_login_map(&self) -> Result<LoginMap> {
        Ok(self.logins())
    }

    async fn begin_refresh(&self, logins: LoginMap) -> Result<IdentitySnapshot> {
        self.refreshes.lock().unwrap().push(logins.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        *self.logins.lock().unwrap() = logins.clone();

        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("script exhausted".to_string()));

        match next {
            Ok(id) => Ok(IdentitySnapshot::from_logins(id, &logins)),
            Err(message) => Err(IdentityError::RefreshFailed(message)),
        }
    }

    async fn install(&self, identity_id: IdentityId, logins: LoginMap) -> Result<IdentitySnapshot> {
        self.installs
            .lock()
            .unwrap()
            .push((identity_id.clone(), logins.clone()));
        *self.logins.lock().unwrap() = logins.clone();
        Ok(IdentitySnapshot::from_logins(identity_id, &logins))
    }
}

/// Hook that records every `(old, new)` pair it sees.
#[derive(Clone, Default)]
pub struct HookLog {
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl HookLog {
    pub fn register(&self, registry: &ChangeHookRegistry) {
        let calls = self.calls.clone();
        registry.register(move |old: IdentityId, new: IdentityId| {
            let calls = calls.clone();
            async move {
                calls.lock().unwrap().push((old.to_string(), new.to_string()));
                Ok::<(), core_identity::HookError>(())
            }
        });
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

pub struct Harness {
    pub store: Arc<FakeStore>,
    pub hooks: ChangeHookRegistry,
    pub event_bus: EventBus,
    pub coordinator: RefreshCoordinator,
    pub tokens: TokenManager,
}

impl Harness {
    pub fn new(store: Arc<FakeStore>) -> Self {
        let hooks = ChangeHookRegistry::new();
        let event_bus = EventBus::new(64);
        let coordinator = RefreshCoordinator::new(store.clone(), hooks.clone(), event_bus.clone());
        let tokens = TokenManager::new(coordinator.clone());

        Self {
            store,
            hooks,
            event_bus,
            coordinator,
            tokens,
        }
    }
}

pub fn logins(entries: &[(&str, &str)]) -> LoginMap {
    entries
        .iter()
        .map(|(service, token)| (service.to_string(), token.to_string()))
        .collect()
}
