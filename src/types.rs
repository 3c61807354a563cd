use derive_more::{Display, From, FromStr, Into};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Home account identifier (`"{uid}.{utid}"` from the client info).
///
/// Unique per user and home tenant. Stable across page loads, so consumers can
/// key their own per-user state on it.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct HomeAccountId(pub String);

impl HomeAccountId {
    /// Builds the identifier from a user id and its home tenant id.
    #[must_use]
    pub fn new(uid: &str, utid: &str) -> Self {
        Self(format!("{uid}.{utid}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Directory tenant identifier (`utid` / `tid`).
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl TenantId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Per-request correlation id sent as `client-request-id`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromStr, From, Into,
)]
#[serde(transparent)]
pub struct CorrelationId(pub Ulid);

impl CorrelationId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }
}
