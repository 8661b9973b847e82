//! Operator access to the scan station.

use crate::config::AccessConfig;
use thiserror::Error;

/// Access refused
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    /// A PIN was entered but does not match
    #[error("Incorrect PIN")]
    IncorrectPin,

    /// The station is protected and no PIN was entered
    #[error("A PIN is required")]
    PinRequired,
}

/// Decides whether an operator may use the station.
pub trait AccessPolicy: Send + Sync {
    /// Check the PIN entered by the operator, if any.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError`] when access is refused.
    fn authorize(&self, pin: Option<&str>) -> Result<(), AccessError>;
}

/// Access guarded by one PIN shared by every operator.
#[derive(Clone)]
pub struct SharedPinPolicy {
    pin: String,
}

impl SharedPinPolicy {
    /// Create a policy expecting `pin`
    #[must_use]
    pub fn new(pin: impl Into<String>) -> Self {
        Self { pin: pin.into() }
    }
}

impl std::fmt::Debug for SharedPinPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedPinPolicy")
            .field("pin", &"<redacted>")
            .finish()
    }
}

impl AccessPolicy for SharedPinPolicy {
    fn authorize(&self, pin: Option<&str>) -> Result<(), AccessError> {
        let Some(pin) = pin.map(str::trim).filter(|pin| !pin.is_empty()) else {
            return Err(AccessError::PinRequired);
        };

        // Constant-time comparison
        if constant_time_eq::constant_time_eq(pin.as_bytes(), self.pin.as_bytes()) {
            Ok(())
        } else {
            tracing::warn!("Incorrect station PIN entered");
            Err(AccessError::IncorrectPin)
        }
    }
}

/// Lets everyone in.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAccess;

impl AccessPolicy for OpenAccess {
    fn authorize(&self, _pin: Option<&str>) -> Result<(), AccessError> {
        Ok(())
    }
}

/// Pick the policy matching the configuration.
///
/// A station without a configured PIN is open to everyone.
#[must_use]
pub fn policy_from_config(config: &AccessConfig) -> Box<dyn AccessPolicy> {
    match &config.station_pin {
        Some(pin) => Box::new(SharedPinPolicy::new(pin.trim())),
        None => {
            tracing::warn!("SCAN_STATION_PIN not set, station is open to everyone");
            Box::new(OpenAccess)
        },
    }
}
