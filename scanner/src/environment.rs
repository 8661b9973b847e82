//! Dependencies injected into the scan reducer.

use crate::providers::{CameraAccess, TicketVerifier};
use ticket_scan_core::environment::Clock;

/// Everything the scan reducer needs from the outside world.
///
/// Generic over its providers so production and tests differ only in what
/// they plug in.
#[derive(Debug, Clone)]
pub struct ScanEnvironment<C, V, K>
where
    C: CameraAccess,
    V: TicketVerifier,
    K: Clock,
{
    /// Camera permission prompt
    pub camera: C,
    /// Ticket verification service
    pub verifier: V,
    /// Stamps resolved outcomes
    pub clock: K,
}

impl<C, V, K> ScanEnvironment<C, V, K>
where
    C: CameraAccess,
    V: TicketVerifier,
    K: Clock,
{
    /// Create a new environment
    #[must_use]
    pub const fn new(camera: C, verifier: V, clock: K) -> Self {
        Self {
            camera,
            verifier,
            clock,
        }
    }
}
