//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates. Host applications can depend on `idlink-workspace` and
//! enable `desktop-shims` (default HTTP client for the custom provider's token
//! exchange) or `mobile` (in-process plugin bridge) without wiring
//! `core-service` themselves.
