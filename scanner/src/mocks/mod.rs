//! Mock provider implementations for testing.
//!
//! In-memory doubles for every provider trait, usable from unit and
//! integration tests.

pub mod camera;
pub mod verifier;

pub use camera::MockCameraAccess;
pub use verifier::MockTicketVerifier;
