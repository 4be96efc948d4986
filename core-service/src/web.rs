//! In-process backing over a [`CredentialStore`].

use core_identity::{CustomProviderBridge, IdentityError, IdentitySnapshot, Result, TokenManager};

pub(crate) struct WebBacking {
    tokens: TokenManager,
    custom: Option<CustomProviderBridge>,
}

impl WebBacking {
    pub fn new(tokens: TokenManager, custom: Option<CustomProviderBridge>) -> Self {
        Self { tokens, custom }
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn custom(&self) -> Result<&CustomProviderBridge> {
        self.custom
            .as_ref()
            .ok_or(IdentityError::CustomProviderNotConfigured)
    }

    pub async fn identity(&self) -> Result<IdentitySnapshot> {
        self.tokens.identity().await
    }
}
