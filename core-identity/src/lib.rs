//! # Identity Module
//!
//! Linked-login management for a federated identity.
//!
//! ## Overview
//!
//! This module keeps track of which login providers ("services") are linked
//! to a federated identity and drives the credential store whenever that set
//! changes. Every refresh goes through one [`RefreshCoordinator`], which
//! guarantees that a single store call is in flight at a time and notifies
//! [`ChangeHookRegistry`] hooks when the backend resolves a different
//! identity id.
//!
//! ## Features
//!
//! - Idempotent link/unlink of login tokens ([`TokenManager`])
//! - Coalesced, serialized credential refreshes
//! - Identity-change hooks with per-hook failure isolation
//! - Developer-authenticated provider via a remote token exchange
//!   ([`CustomProviderBridge`], [`HttpTokenExchange`])
//! - Identity events published on the core event bus

pub mod coordinator;
pub mod custom;
pub mod error;
pub mod exchange;
pub mod hooks;
pub mod manager;
pub mod store;
pub mod types;

pub use bridge_traits::LoginMap;
pub use coordinator::RefreshCoordinator;
pub use custom::CustomProviderBridge;
pub use error::{HookError, IdentityError, Result};
pub use exchange::{ExchangeRequest, ExchangeResponse, HttpTokenExchange, TokenExchange};
pub use hooks::{ChangeHook, ChangeHookRegistry, HookReport, HookResult};
pub use manager::TokenManager;
pub use store::{CredentialStore, ProviderCredentialStore};
pub use types::{IdentityId, IdentitySnapshot};
