//! Error types for the scan session.

use thiserror::Error;

/// Result type alias for scan operations.
pub type Result<T> = std::result::Result<T, ScanError>;

/// Everything that can end a scan attempt without an accepted ticket.
///
/// Remote rejections and transport failures stay separate here even though
/// the default screen shows one message for both; see
/// [`ScanError::user_message`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScanError {
    // ═══════════════════════════════════════════════════════════
    // Session
    // ═══════════════════════════════════════════════════════════

    /// Camera permission was denied. Terminal for the session.
    #[error("Camera permission denied")]
    PermissionDenied,

    // ═══════════════════════════════════════════════════════════
    // Local (never reach the network)
    // ═══════════════════════════════════════════════════════════

    /// Scanned text is not a JSON object.
    #[error("Scanned code is not a JSON object")]
    MalformedPayload,

    /// Scanned object carries no `uniq_id`.
    #[error("Scanned code has no uniq_id")]
    MissingIdentifier,

    // ═══════════════════════════════════════════════════════════
    // Remote
    // ═══════════════════════════════════════════════════════════

    /// The verification service answered with a non-200 status
    /// (unknown ticket, already used, ...).
    #[error("Ticket rejected by verification service (status {status})")]
    VerificationRejected {
        /// HTTP status code
        status: u16,
    },

    /// The request never got an answer (DNS, refused connection, timeout).
    #[error("Verification request failed: {0}")]
    TransportFailure(String),

    /// The service said 200 but the body could not be read to the end.
    #[error("Verification response could not be read: {0}")]
    InvalidResponse(String),
}

impl ScanError {
    /// Message for the station screen.
    ///
    /// With `distinguish == false` every rejection reads the same, which is
    /// how the scan screen has always behaved.
    #[must_use]
    pub const fn user_message(&self, distinguish: bool) -> &'static str {
        match (self, distinguish) {
            (Self::PermissionDenied, _) => "No access to camera",
            (_, false) => "Ticket could not be verified",
            (Self::MalformedPayload | Self::MissingIdentifier, true) => {
                "This QR code is not a ticket"
            },
            (Self::VerificationRejected { .. }, true) => "Ticket was not accepted",
            (Self::TransportFailure(_), true) => "Verification service unreachable",
            (Self::InvalidResponse(_), true) => "Verification service sent an unreadable answer",
        }
    }

    /// Whether the failure was decided on the device, without a network call.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::MalformedPayload | Self::MissingIdentifier)
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission_denied",
            Self::MalformedPayload => "malformed_payload",
            Self::MissingIdentifier => "missing_identifier",
            Self::VerificationRejected { .. } => "verification_rejected",
            Self::TransportFailure(_) => "transport_failure",
            Self::InvalidResponse(_) => "invalid_response",
        }
    }
}
