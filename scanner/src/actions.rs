//! Scan session actions.
//!
//! Commands come from the screen (user gestures and decoder callbacks);
//! events are fed back by effects once async work finishes.

use crate::error::ScanError;
use crate::state::{PermissionStatus, TicketDetails, VerificationRequest};

/// Every input the scan reducer understands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanAction {
    // Commands
    /// Screen became active; ask for camera permission once
    StartSession,

    /// Turn the camera on
    Arm,

    /// Turn the camera off
    Disarm,

    /// The barcode decoder produced a string
    CodeDecoded {
        /// Raw decoded text
        raw: String,
    },

    /// User dismissed the result and wants the next ticket
    ScanAgain,

    // Events
    /// Permission prompt was answered
    PermissionResolved {
        /// Answer from the platform
        status: PermissionStatus,
    },

    /// Verification service answered, or the call failed
    VerificationCompleted {
        /// Request that was verified
        request: VerificationRequest,
        /// Travel record of an accepted ticket, if any, or why it was refused
        result: Result<Option<TicketDetails>, ScanError>,
    },
}

impl ScanAction {
    /// Shorthand for a decoder callback
    #[must_use]
    pub fn decoded(raw: impl Into<String>) -> Self {
        Self::CodeDecoded { raw: raw.into() }
    }
}
