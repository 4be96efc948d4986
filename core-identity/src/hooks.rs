//! Identity Change Hooks
//!
//! Callbacks invoked when a refresh resolves to a different identity id than
//! the operation before it (for example when an anonymous identity is merged
//! into an authenticated one and the backend retires the old id).
//!
//! Hooks run concurrently and in isolation: a hook that fails or panics is
//! logged and reported, never propagated to the caller whose refresh
//! triggered it, and never prevents the other hooks from running.

use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

use crate::error::HookError;
use crate::types::IdentityId;

pub type HookResult = std::result::Result<(), HookError>;

/// Callback notified with `(old_id, new_id)` whenever the identity id changes.
///
/// Implemented for any `Fn(IdentityId, IdentityId) -> impl Future<Output = HookResult>`,
/// so most hooks are plain closures:
///
/// ```
/// use core_identity::{ChangeHookRegistry, HookError, IdentityId};
///
/// let hooks = ChangeHookRegistry::new();
/// hooks.register(|old: IdentityId, new: IdentityId| async move {
///     println!("identity moved from {old} to {new}");
///     Ok::<(), HookError>(())
/// });
/// assert_eq!(hooks.len(), 1);
/// ```
#[async_trait]
pub trait ChangeHook: Send + Sync {
    async fn on_identity_changed(&self, old_id: &IdentityId, new_id: &IdentityId) -> HookResult;
}

#[async_trait]
impl<F, Fut> ChangeHook for F
where
    F: Fn(IdentityId, IdentityId) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HookResult> + Send + 'static,
{
    async fn on_identity_changed(&self, old_id: &IdentityId, new_id: &IdentityId) -> HookResult {
        (self)(old_id.clone(), new_id.clone()).await
    }
}

/// Outcome of one notification round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookReport {
    /// Number of hooks invoked.
    pub invoked: usize,
    /// Failures reported (or panics caught) during the round.
    pub failures: Vec<HookError>,
}

impl HookReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Ordered collection of change hooks.
///
/// Clones share the same underlying list, so a registry handed to a client
/// can still be extended by the host afterwards.
#[derive(Clone, Default)]
pub struct ChangeHookRegistry {
    hooks: Arc<RwLock<Vec<Arc<dyn ChangeHook>>>>,
}

impl ChangeHookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook. Registering the same callback twice notifies it twice.
    pub fn register<H>(&self, hook: H)
    where
        H: ChangeHook + 'static,
    {
        self.register_arc(Arc::new(hook));
    }

    pub fn register_arc(&self, hook: Arc<dyn ChangeHook>) {
        self.hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every registered hook.
    pub fn clear(&self) {
        self.hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Invoke every hook with `(old_id, new_id)` and wait for all of them.
    ///
    /// The list is snapshotted first; hooks registered while a round is in
    /// flight only see later changes.
    pub async fn notify(&self, old_id: &IdentityId, new_id: &IdentityId) -> HookReport {
        let hooks: Vec<Arc<dyn ChangeHook>> = self
            .hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        if hooks.is_empty() {
            return HookReport::default();
        }

        debug!(hooks = hooks.len(), old_id = %old_id, new_id = %new_id, "Notifying change hooks");

        let outcomes = join_all(hooks.iter().map(|hook| {
            AssertUnwindSafe(hook.on_identity_changed(old_id, new_id)).catch_unwind()
        }))
        .await;

        let mut report = HookReport {
            invoked: hooks.len(),
            failures: Vec::new(),
        };

        for (index, outcome) in outcomes.into_iter().enumerate() {
            let failure = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err,
                Err(panic) => HookError::new(panic_message(panic.as_ref())),
            };
            warn!(hook = index, error = %failure, "Change hook failed");
            report.failures.push(failure);
        }

        report
    }
}

impl std::fmt::Debug for ChangeHookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeHookRegistry")
            .field("hooks", &self.len())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("hook panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("hook panicked: {message}")
    } else {
        "hook panicked".to_string()
    }
}
