#![doc = include_str!("../README.md")]

pub mod account;
pub mod authority;
pub mod cache;
pub mod client;
pub mod client_info;
pub mod config;
pub mod error;
pub mod id_token;
pub mod network;
pub mod random;
pub mod request;
pub mod request_params;
pub mod response;
pub mod scopes;
pub mod types;

// Re-exports for convenient access
pub use account::Account;
pub use authority::{Authority, AuthorityEndpoints};
pub use cache::{CacheManager, CacheStorage, MemoryStorage, PersistentCacheKey, TemporaryCacheKey};
pub use client::AuthClient;
pub use client_info::ClientInfo;
pub use config::{AuthConfig, UriSource};
pub use error::Error;
pub use id_token::{IdToken, IdTokenClaims};
#[cfg(feature = "reqwest")]
pub use network::ReqwestNetwork;
pub use network::NetworkModule;
pub use request::{AuthenticationParameters, Prompt};
pub use request_params::ServerRequestParameters;
pub use response::{AuthResponse, ResponseParser, ResponseStateInfo, TokenType};
pub use types::{CorrelationId, HomeAccountId, TenantId};
