//! Error types for the portal client.
//!
//! A small, closed taxonomy that callers branch on. Soft backend conditions
//! ("no attendance found", "no approved fee request") are carried as the
//! structured [`PortalError::NoData`] variant rather than requiring callers
//! to pattern-match message text; the raw status object is still serialized
//! into the Display output so nothing is lost.

use serde_json::Value;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PortalError>;

/// Soft backend conditions that are not failures of the request machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoDataKind {
    /// The backend has no records for the requested period (e.g. a semester
    /// with no attendance yet).
    NoDataForPeriod,
    /// The requested operation needs an approved request that does not exist
    /// (e.g. printing a fee receipt without an approved fee request).
    NoApprovedRequest,
}

/// Errors raised by the portal client.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    /// Default domain failure. The backend's raw `status` object is carried
    /// verbatim and serialized into the message.
    #[error("portal API error: {status}")]
    Api {
        /// Raw `status` object from the response envelope.
        status: Value,
    },

    /// Either phase of the login flow failed.
    #[error("login failed: {0}")]
    Login(String),

    /// HTTP 401 from an authenticated call. The token is discovered to be
    /// expired reactively; there is no proactive expiry check.
    #[error("session expired, log in again")]
    SessionExpired,

    /// Password-change failure.
    #[error("password change failed: {0}")]
    Account(String),

    /// HTTP 513: the backend signals temporary unavailability.
    #[error("the portal backend is temporarily unavailable, try again later")]
    Unavailable,

    /// The host could not be reached at the network level.
    #[error("cannot reach the portal, check your connection: {0}")]
    Network(String),

    /// A soft condition the caller may treat as "empty result". The raw
    /// status object stays in the message for display purposes.
    #[error("no data: {status}")]
    NoData {
        /// Which soft condition was recognized.
        kind: NoDataKind,
        /// Raw `status` object from the response envelope.
        status: Value,
    },

    /// The response body did not match the expected shape.
    #[error("unexpected response: {0}")]
    Parse(String),

    /// A cryptographic primitive failed. Fatal at this layer; never retried
    /// or masked.
    #[error("request signing failed: {0}")]
    Crypto(String),

    /// Local persistence of a downloaded document failed.
    #[error("failed to persist downloaded file: {0}")]
    Io(String),
}

impl PortalError {
    /// Creates a domain failure carrying the raw status object.
    pub fn api(status: Value) -> Self {
        PortalError::Api { status }
    }

    /// Creates a login failure.
    pub fn login(message: impl Into<String>) -> Self {
        PortalError::Login(message.into())
    }

    /// Creates an account-operation failure.
    pub fn account(message: impl Into<String>) -> Self {
        PortalError::Account(message.into())
    }

    /// Creates a network failure.
    pub fn network(message: impl Into<String>) -> Self {
        PortalError::Network(message.into())
    }

    /// Creates a soft no-data condition.
    pub fn no_data(kind: NoDataKind, status: Value) -> Self {
        PortalError::NoData { kind, status }
    }

    /// Creates a parse failure.
    pub fn parse(message: impl Into<String>) -> Self {
        PortalError::Parse(message.into())
    }

    /// Creates a crypto failure.
    pub fn crypto(message: impl Into<String>) -> Self {
        PortalError::Crypto(message.into())
    }

    /// Returns true for soft conditions that callers typically render as an
    /// empty result instead of a failure.
    pub fn is_no_data(&self) -> bool {
        matches!(self, PortalError::NoData { .. })
    }

    /// Returns true when retrying later may help (backend down or network
    /// unreachable). The client itself never retries.
    pub fn is_transient(&self) -> bool {
        matches!(self, PortalError::Unavailable | PortalError::Network(_))
    }

    /// Returns true when the caller must log in again before continuing.
    pub fn needs_login(&self) -> bool {
        matches!(self, PortalError::SessionExpired)
    }
}
