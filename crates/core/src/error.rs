//! Error taxonomy.

use thiserror::Error;

use crate::model::Identity;

/// Failure taxonomy shared by every bridge component.
///
/// Only `ConfigurationInvalid` and `RestartsExhausted` are fatal; everything else is
/// caught at the component boundary and turned into an outcome value.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("caller {0} is not authorized")]
    AuthorizationDenied(Identity),

    #[error("capture failed: {0}")]
    CaptureFailure(String),

    #[error("actuation failed: {0}")]
    ActuationFailure(String),

    #[error("delivery to {recipient} failed: {reason}")]
    DeliveryFailure { recipient: Identity, reason: String },

    #[error("worker exited unexpectedly: {0}")]
    WorkerCrash(String),

    #[error("worker restarted {0} times; giving up")]
    RestartsExhausted(u32),

    #[error("invalid configuration: {0}")]
    ConfigurationInvalid(String),

    #[error("snapshot persistence failed: {0}")]
    Persistence(String),
}

impl BridgeError {
    pub fn capture<E: std::fmt::Display>(e: E) -> Self {
        Self::CaptureFailure(e.to_string())
    }

    pub fn actuation<E: std::fmt::Display>(e: E) -> Self {
        Self::ActuationFailure(e.to_string())
    }

    pub fn persistence<E: std::fmt::Display>(e: E) -> Self {
        Self::Persistence(e.to_string())
    }

    /// Fatal errors must stop the owning process.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigurationInvalid(_) | Self::RestartsExhausted(_)
        )
    }
}

/// Convenience alias for bridge results.
pub type Result<T, E = BridgeError> = std::result::Result<T, E>;
