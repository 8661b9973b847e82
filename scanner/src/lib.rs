//! # Ticket Scan
//!
//! Scan session for a ticket-checking station: camera permission, QR
//! payload decoding and verification against the reservation service.
//!
//! ## Architecture
//!
//! The session is a reducer run by the Store; permission prompts and
//! verification calls are effects:
//!
//! ```text
//! StartSession → (prompt) → PermissionResolved
//! Arm → CodeDecoded → (lock, verify) → VerificationCompleted → ScanAgain
//! ```
//!
//! One decoded code is verified at a time. The lock taken on decode is only
//! released by "scan again", and tearing the session down drops any
//! verification still in flight.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ticket_scan::*;
//!
//! let environment = ScanEnvironment::new(
//!     FixedCameraAccess::new(PermissionStatus::Granted),
//!     HttpTicketVerifier::from_config(&config.verification)?,
//!     SystemClock,
//! );
//!
//! let session = ScanSession::start(environment).await?;
//! session.settle(Duration::from_secs(5)).await?;
//! session.arm().await?;
//!
//! session.code_decoded(r#"{"uniq_id":"abc123"}"#).await?.wait().await;
//! for line in session.snapshot().await.last_outcome.summary_lines(false) {
//!     println!("{line}");
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod access;
pub mod actions;
pub mod config;
pub mod environment;
pub mod error;
pub mod payload;
pub mod providers;
pub mod reducer;
pub mod session;
pub mod state;
pub mod station;

// Test utilities
#[cfg(feature = "test-utils")]
pub mod mocks;

// Re-export main types for convenience
pub use access::{AccessError, AccessPolicy, OpenAccess, SharedPinPolicy};
pub use actions::ScanAction;
pub use config::{Config, ConfigError};
pub use environment::ScanEnvironment;
pub use error::{Result, ScanError};
pub use payload::decode_payload;
pub use providers::{CameraAccess, FixedCameraAccess, HttpTicketVerifier, TicketVerifier};
pub use reducer::ScanReducer;
pub use session::{ScanSession, ScanStore};
pub use station::{StationError, StationExit, StationOptions};
pub use state::{
    Outcome, Permission, PermissionStatus, ScanState, SessionPhase, TicketDetails, TicketId,
    TravelDate, VerificationRequest,
};
pub use ticket_scan_core::environment::SystemClock;
