//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the identity core and the
//! platform-specific collaborators it drives. Each trait represents a
//! capability the core requires but that must be implemented differently per
//! platform (desktop, iOS, Android, web).
//!
//! ## Traits
//!
//! ### Identity
//! - [`CredentialProvider`](credentials::CredentialProvider) - Native SDK credential object (login map, identity id, refresh)
//! - [`NativeBridge`](command::NativeBridge) - Named-action command bridge into a mobile plugin
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Transport for the remote token exchange
//!
//! ### Utilities
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Provides |
//! |----------|---------------------|----------|
//! | Desktop  | `bridge-desktop`    | `HttpClient` |
//! | iOS      | `bridge-mobile`     | `NativeBridge` over a host `CredentialProvider` |
//! | Android  | `bridge-mobile`     | `NativeBridge` over a host `CredentialProvider` |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert native failures into `BridgeError` with an
//! actionable message and must never put login tokens into error text.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across async tasks behind `Arc`.

pub mod command;
pub mod credentials;
pub mod error;
pub mod http;
pub mod logging;

pub use error::BridgeError;

// Re-export commonly used types
pub use command::{actions, IdentityPayload, NativeBridge};
pub use credentials::{CredentialProvider, LoginMap};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
