//! # Refresh Coordinator
//!
//! Serializes every call into the [`CredentialStore`] so that at most one
//! refresh (or identity install) is in flight at any instant, detects
//! identity-id changes, and notifies the registered change hooks.
//!
//! ## Scheduling
//!
//! Operations form a chain: each one first awaits its predecessor, discards
//! the predecessor's outcome apart from its identity id, and only then calls
//! the store. The predecessor's id becomes `old_id` for change detection
//! (`None` when there was no predecessor or it failed).
//!
//! Refresh requests coalesce. While a refresh is queued behind the in-flight
//! one and has not yet reached the store, further requests join it instead
//! of queueing their own: the most recent login map wins and every joined
//! caller observes the same outcome. Two requests issued while one refresh
//! is pending therefore cause exactly one extra store call.
//!
//! Each operation runs on its own task, so a caller dropping its future
//! never stalls the chain or leaves `last_snapshot` behind.

use bridge_traits::LoginMap;
use core_runtime::events::{CoreEvent, EventBus, IdentityEvent};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{IdentityError, Result};
use crate::hooks::ChangeHookRegistry;
use crate::store::CredentialStore;
use crate::types::{IdentityId, IdentitySnapshot};

type Outcome = std::result::Result<IdentitySnapshot, String>;
type SharedOutcome = Shared<BoxFuture<'static, Outcome>>;

enum Operation {
    Refresh { ticket: u64 },
    Install { identity_id: IdentityId, logins: LoginMap },
}

struct QueuedRefresh {
    ticket: u64,
    outcome: SharedOutcome,
}

#[derive(Default)]
struct CoordinatorState {
    /// Tail of the operation chain.
    pending: Option<SharedOutcome>,
    /// Refresh that has not reached the store yet and still accepts joiners.
    queued: Option<QueuedRefresh>,
    /// Login maps of refreshes that have not started, by ticket.
    requested_logins: BTreeMap<u64, LoginMap>,
    last_snapshot: Option<IdentitySnapshot>,
    next_ticket: u64,
}

struct Inner {
    store: Arc<dyn CredentialStore>,
    hooks: ChangeHookRegistry,
    event_bus: EventBus,
    state: Mutex<CoordinatorState>,
}

/// Single owner of the refresh state machine.
///
/// Cloning is cheap and every clone drives the same chain; create one per
/// application context and hand clones to its consumers.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hooks: ChangeHookRegistry,
        event_bus: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                hooks,
                event_bus,
                state: Mutex::new(CoordinatorState::default()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.inner.store
    }

    pub fn hooks(&self) -> &ChangeHookRegistry {
        &self.inner.hooks
    }

    /// Replace the login map and resolve the identity for it.
    ///
    /// When a refresh is already queued behind the in-flight one, this call
    /// joins it and `logins` replaces the map that refresh will install. The
    /// returned snapshot then describes the most recently requested map,
    /// which need not be `logins`.
    ///
    /// A failed refresh is returned to every caller that joined it; it never
    /// fails a later request.
    #[instrument(skip(self, logins), fields(providers = logins.len()))]
    pub async fn refresh(&self, logins: LoginMap) -> Result<IdentitySnapshot> {
        let outcome = {
            let mut state = self.inner.state.lock().await;
            match state.queued.as_ref() {
                Some(queued) => {
                    debug!(ticket = queued.ticket, "Joining queued refresh");
                    let ticket = queued.ticket;
                    let outcome = queued.outcome.clone();
                    state.requested_logins.insert(ticket, logins);
                    outcome
                }
                None => {
                    let ticket = state.next_ticket;
                    state.next_ticket += 1;
                    state.requested_logins.insert(ticket, logins);
                    let outcome = self.enqueue(&mut state, Operation::Refresh { ticket });
                    state.queued = Some(QueuedRefresh {
                        ticket,
                        outcome: outcome.clone(),
                    });
                    outcome
                }
            }
        };

        outcome.await.map_err(IdentityError::RefreshFailed)
    }

    /// Adopt an identity minted elsewhere together with its login map.
    ///
    /// Installs are ordered like refreshes but never coalesce; refreshes
    /// requested afterwards run after the install.
    #[instrument(skip(self, logins), fields(identity_id = %identity_id, providers = logins.len()))]
    pub async fn install(
        &self,
        identity_id: IdentityId,
        logins: LoginMap,
    ) -> Result<IdentitySnapshot> {
        let outcome = {
            let mut state = self.inner.state.lock().await;
            state.queued = None;
            self.enqueue(&mut state, Operation::Install { identity_id, logins })
        };

        outcome.await.map_err(IdentityError::RefreshFailed)
    }

    /// Snapshot of the most recent operation, awaiting it if still in flight.
    ///
    /// Triggers a refresh with the store's current login map when nothing has
    /// run yet, or when the latest operation failed and no earlier snapshot
    /// exists.
    pub async fn current(&self) -> Result<IdentitySnapshot> {
        let pending = self.inner.state.lock().await.pending.clone();

        if let Some(pending) = pending {
            match pending.await {
                Ok(snapshot) => return Ok(snapshot),
                Err(message) => {
                    if let Some(snapshot) = self.last_snapshot().await {
                        debug!(error = %message, "Latest refresh failed, serving last snapshot");
                        return Ok(snapshot);
                    }
                }
            }
        }

        let logins = self.inner.store.current_login_map().await?;
        self.refresh(logins).await
    }

    /// Last successfully resolved snapshot, without waiting.
    pub async fn last_snapshot(&self) -> Option<IdentitySnapshot> {
        self.inner.state.lock().await.last_snapshot.clone()
    }

    fn enqueue(&self, state: &mut CoordinatorState, operation: Operation) -> SharedOutcome {
        let predecessor = state.pending.take();
        let outcome = Self::run(self.inner.clone(), predecessor, operation)
            .boxed()
            .shared();

        state.pending = Some(outcome.clone());
        tokio::spawn(outcome.clone());
        outcome
    }

    async fn run(
        inner: Arc<Inner>,
        predecessor: Option<SharedOutcome>,
        operation: Operation,
    ) -> Outcome {
        let old_id = match predecessor {
            Some(predecessor) => predecessor
                .await
                .ok()
                .map(|snapshot| snapshot.identity_id().clone()),
            None => None,
        };

        let result = match operation {
            Operation::Refresh { ticket } => {
                let logins = {
                    let mut state = inner.state.lock().await;
                    if state.queued.as_ref().map(|q| q.ticket) == Some(ticket) {
                        state.queued = None;
                    }
                    state.requested_logins.remove(&ticket)
                };
                let logins = logins.ok_or_else(|| {
                    format!("refresh request {ticket} has no login map")
                })?;

                inner.emit(IdentityEvent::Refreshing {
                    previous_identity_id: old_id.as_ref().map(|id| id.to_string()),
                });
                inner.store.begin_refresh(logins).await
            }
            Operation::Install {
                identity_id,
                logins,
            } => {
                inner.emit(IdentityEvent::Refreshing {
                    previous_identity_id: old_id.as_ref().map(|id| id.to_string()),
                });
                inner.store.install(identity_id, logins).await
            }
        };

        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(err) => {
                let message = match err {
                    IdentityError::RefreshFailed(message) => message,
                    other => other.to_string(),
                };
                warn!(error = %message, "Identity refresh failed");
                inner.emit(IdentityEvent::RefreshFailed {
                    message: message.clone(),
                });
                return Err(message);
            }
        };

        let new_id = snapshot.identity_id();
        if let Some(old_id) = old_id.as_ref().filter(|old| *old != new_id) {
            info!(old_id = %old_id, new_id = %new_id, "Identity id changed");
            inner.emit(IdentityEvent::IdentityChanged {
                old_identity_id: old_id.to_string(),
                new_identity_id: new_id.to_string(),
            });

            let report = inner.hooks.notify(old_id, new_id).await;
            for failure in report.failures {
                inner.emit(IdentityEvent::HookFailed {
                    message: failure.message().to_string(),
                });
            }
        }

        inner.state.lock().await.last_snapshot = Some(snapshot.clone());
        inner.emit(IdentityEvent::Refreshed {
            identity_id: snapshot.identity_id().to_string(),
            services: snapshot.services().iter().cloned().collect(),
        });

        Ok(snapshot)
    }
}

impl Inner {
    fn emit(&self, event: IdentityEvent) {
        let _ = self.event_bus.emit(CoreEvent::Identity(event));
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("hooks", &self.inner.hooks)
            .finish_non_exhaustive()
    }
}
