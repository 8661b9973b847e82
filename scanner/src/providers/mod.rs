//! Collaborator traits and their production implementations.
//!
//! The reducer only ever talks to these traits; tests swap in the doubles
//! from `crate::mocks`.

use crate::error::Result;
use crate::state::{PermissionStatus, TicketDetails, VerificationRequest};
use std::future::Future;

pub mod camera;
pub mod http;

pub use camera::FixedCameraAccess;
pub use http::HttpTicketVerifier;

/// Platform camera permission.
pub trait CameraAccess: Send + Sync {
    /// Show the permission prompt and wait for the answer.
    ///
    /// Called at most once per session. The platform call itself is assumed
    /// not to fail once it returns.
    fn request_permission(&self) -> impl Future<Output = PermissionStatus> + Send;
}

/// Remote ticket verification.
pub trait TicketVerifier: Send + Sync {
    /// Check a ticket identifier against the reservation records.
    ///
    /// One call, no retries. A 200 answer always accepts the ticket; the
    /// travel record is `None` when the answer carries none that can be read.
    ///
    /// # Errors
    ///
    /// - [`crate::ScanError::VerificationRejected`] for any non-200 answer
    /// - [`crate::ScanError::TransportFailure`] when no answer arrives
    /// - [`crate::ScanError::InvalidResponse`] when a 200 body is cut short
    fn verify(
        &self,
        request: &VerificationRequest,
    ) -> impl Future<Output = Result<Option<TicketDetails>>> + Send;
}
