#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Missing or invalid client configuration (redirect URI, authority).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Request parameters rejected before any URL was built.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The URL fragment is not an authentication response.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Echoed `state` does not match the cached request state.
    #[error("State mismatch: response state does not match the request state")]
    StateMismatch,

    /// `nonce` claim of the id token does not match the cached nonce.
    #[error("Nonce mismatch: id token nonce does not match the request nonce")]
    NonceMismatch,

    /// Identity provider returned an error payload.
    #[error("Server error {code}: {description}")]
    Server { code: String, description: String },

    /// Identity provider requires user interaction to continue.
    #[error("Interaction required {code}: {description}")]
    InteractionRequired { code: String, description: String },

    /// Id token or client info could not be decoded.
    #[error("Token error: {0}")]
    Token(String),

    /// Authority metadata is missing or malformed.
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Endpoint answered with a non-success status.
    #[error("Network error during {operation}: {detail}")]
    Network {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },

    #[cfg(feature = "reqwest")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Whether re-issuing the same call may succeed without caller changes.
    ///
    /// Only network and discovery failures qualify. Everything else is either
    /// a configuration defect or requires restarting the flow.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Discovery(_) => true,
            #[cfg(feature = "reqwest")]
            Self::Http(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_errors_are_retryable() {
        let err = Error::Network {
            operation: "authority discovery",
            status: Some(503),
            detail: "unavailable".into(),
        };
        assert!(err.is_retryable());
        assert!(Error::Discovery("missing issuer".into()).is_retryable());
    }

    #[test]
    fn protocol_errors_are_not_retryable() {
        assert!(!Error::Configuration("no redirect uri".into()).is_retryable());
        assert!(!Error::StateMismatch.is_retryable());
        assert!(!Error::UnexpectedResponse("empty hash".into()).is_retryable());
    }

    #[test]
    fn server_error_display_includes_code() {
        let err = Error::Server {
            code: "access_denied".into(),
            description: "user cancelled".into(),
        };
        assert_eq!(err.to_string(), "Server error access_denied: user cancelled");
    }
}
