//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! Desktop hosts have no native identity SDK to proxy to, so the only
//! collaborator shipped here is the transport for the remote token exchange:
//! - `HttpClient` using `reqwest`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestHttpClient;
//! use core_identity::HttpTokenExchange;
//! use std::sync::Arc;
//!
//! let http_client = Arc::new(ReqwestHttpClient::new()?);
//! let exchange = HttpTokenExchange::new(http_client, "https://functions.example.com/identity")?;
//! ```

mod http;

pub use http::ReqwestHttpClient;
