//! Cache bridge between the protocol state machine and host storage.
//!
//! The flow spans a full page navigation, so everything the response handler
//! needs must be written to storage before the redirect. Two namespaces are
//! kept apart:
//!
//! - *Temporary* entries belong to a single request/response round trip and are
//!   cleared once the response has been matched.
//! - *Persistent* entries hold the session artifacts and survive until sign-out.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

const KEY_PREFIX: &str = "implicit_auth";

/// Host-provided key-value storage (browser storage, a file, a database row).
///
/// Implementations need no locking beyond what makes `&self` mutation sound:
/// flows sharing a storage must be serialized by the caller.
pub trait CacheStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;

    fn set_item(&self, key: &str, value: &str);

    fn remove_item(&self, key: &str);
}

/// In-process storage, mainly for tests and single-process hosts.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
    }

    fn remove_item(&self, key: &str) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// Request-scoped entries, written before redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporaryCacheKey {
    RequestState,
    Nonce,
    LoginStartPage,
    RequestScopes,
}

impl TemporaryCacheKey {
    pub const ALL: [Self; 4] = [
        Self::RequestState,
        Self::Nonce,
        Self::LoginStartPage,
        Self::RequestScopes,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::RequestState => "request.state",
            Self::Nonce => "nonce",
            Self::LoginStartPage => "login.start.page",
            Self::RequestScopes => "request.scopes",
        }
    }
}

/// Session-scoped entries, written only after a validated response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersistentCacheKey {
    IdToken,
    ClientInfo,
}

impl PersistentCacheKey {
    pub const ALL: [Self; 2] = [Self::IdToken, Self::ClientInfo];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::IdToken => "idtoken",
            Self::ClientInfo => "client.info",
        }
    }
}

/// Namespaced view of a [`CacheStorage`] for one client id.
pub struct CacheManager<S> {
    storage: Arc<S>,
    client_id: String,
}

impl<S: CacheStorage> CacheManager<S> {
    pub fn new(storage: Arc<S>, client_id: impl Into<String>) -> Self {
        Self {
            storage,
            client_id: client_id.into(),
        }
    }

    #[must_use]
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Fully-qualified storage key of a temporary entry.
    #[must_use]
    pub fn temporary_key(&self, key: TemporaryCacheKey) -> String {
        format!("{KEY_PREFIX}.{}.temp.{}", self.client_id, key.name())
    }

    /// Fully-qualified storage key of a persistent entry.
    #[must_use]
    pub fn persistent_key(&self, key: PersistentCacheKey) -> String {
        format!("{KEY_PREFIX}.{}.{}", self.client_id, key.name())
    }

    pub fn get_temporary(&self, key: TemporaryCacheKey) -> Option<String> {
        self.storage.get_item(&self.temporary_key(key))
    }

    pub fn set_temporary(&self, key: TemporaryCacheKey, value: &str) {
        self.storage.set_item(&self.temporary_key(key), value);
    }

    /// Persistent entry, with empty values reported as absent.
    pub fn get_persistent(&self, key: PersistentCacheKey) -> Option<String> {
        self.storage
            .get_item(&self.persistent_key(key))
            .filter(|v| !v.is_empty())
    }

    pub fn set_persistent(&self, key: PersistentCacheKey, value: &str) {
        self.storage.set_item(&self.persistent_key(key), value);
    }

    /// Drops every temporary entry of the current flow.
    pub fn reset_temporary(&self) {
        for key in TemporaryCacheKey::ALL {
            self.storage.remove_item(&self.temporary_key(key));
        }
    }

    /// Drops the session artifacts.
    pub fn clear_persistent(&self) {
        for key in PersistentCacheKey::ALL {
            self.storage.remove_item(&self.persistent_key(key));
        }
    }
}
