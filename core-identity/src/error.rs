use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Identity refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Custom provider token exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("Custom provider detach failed: {0}")]
    DetachFailed(String),

    #[error("No custom provider configured")]
    CustomProviderNotConfigured,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid bridge response: {0}")]
    InvalidResponse(String),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, IdentityError>;

/// Failure reported by a change hook.
///
/// Hook failures are isolated: they are logged and surfaced as events but
/// never converted into an [`IdentityError`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Identity change hook failed: {message}")]
pub struct HookError {
    message: String,
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
