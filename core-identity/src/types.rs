use bridge_traits::{IdentityPayload, LoginMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::IdentityError;

/// Opaque identifier of a federated identity, assigned by the identity backend.
///
/// # Examples
///
/// ```
/// use core_identity::IdentityId;
///
/// let id = IdentityId::new("us-east-1:6e1c0b7a-93f2-4d38-a4c5-1f2e3d4c5b6a");
/// assert_eq!(id.as_str(), "us-east-1:6e1c0b7a-93f2-4d38-a4c5-1f2e3d4c5b6a");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(String);

impl IdentityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for IdentityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for IdentityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Immutable view of a resolved identity and its linked login providers.
///
/// Snapshots are produced only by a successful refresh (or identity install)
/// and are never mutated afterwards; the next operation yields a new value.
///
/// Serializes as the bridge success payload:
///
/// ```
/// use core_identity::IdentitySnapshot;
///
/// let snapshot = IdentitySnapshot::new("id-1", ["google"]);
/// let json = serde_json::to_value(&snapshot).unwrap();
/// assert_eq!(json, serde_json::json!({ "identityId": "id-1", "services": ["google"] }));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySnapshot {
    identity_id: IdentityId,
    services: BTreeSet<String>,
}

impl IdentitySnapshot {
    pub fn new<I, S>(identity_id: impl Into<IdentityId>, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identity_id: identity_id.into(),
            services: services.into_iter().map(Into::into).collect(),
        }
    }

    /// Snapshot whose services are exactly the keys of `logins`.
    pub fn from_logins(identity_id: impl Into<IdentityId>, logins: &LoginMap) -> Self {
        Self::new(identity_id, logins.keys().cloned())
    }

    pub fn identity_id(&self) -> &IdentityId {
        &self.identity_id
    }

    pub fn services(&self) -> &BTreeSet<String> {
        &self.services
    }

    /// Whether `service` is currently linked.
    pub fn is_linked(&self, service: &str) -> bool {
        self.services.contains(service)
    }
}

impl From<IdentitySnapshot> for IdentityPayload {
    fn from(snapshot: IdentitySnapshot) -> Self {
        Self {
            identity_id: snapshot.identity_id.0,
            services: snapshot.services.into_iter().collect(),
        }
    }
}

impl TryFrom<IdentityPayload> for IdentitySnapshot {
    type Error = IdentityError;

    fn try_from(payload: IdentityPayload) -> Result<Self, Self::Error> {
        if payload.identity_id.is_empty() {
            return Err(IdentityError::InvalidResponse(
                "identity payload carries an empty identityId".to_string(),
            ));
        }
        Ok(Self::new(payload.identity_id, payload.services))
    }
}
