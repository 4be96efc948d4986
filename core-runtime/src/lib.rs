//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the identity crates:
//! - Logging and tracing infrastructure
//! - Identity configuration
//! - Event bus system
//!
//! ## Overview
//!
//! Nothing in here knows about refreshes or login maps. It establishes the
//! logging conventions, configuration validation and event broadcasting used
//! throughout the workspace.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
