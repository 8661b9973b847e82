//! Mock camera permission for testing.

use crate::providers::CameraAccess;
use crate::state::PermissionStatus;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Mock camera.
///
/// Answers with a fixed status and counts how often it was asked.
#[derive(Debug, Clone)]
pub struct MockCameraAccess {
    status: PermissionStatus,
    requests: Arc<AtomicUsize>,
}

impl MockCameraAccess {
    /// Camera that grants permission.
    #[must_use]
    pub fn granting() -> Self {
        Self::answering(PermissionStatus::Granted)
    }

    /// Camera that denies permission.
    #[must_use]
    pub fn denying() -> Self {
        Self::answering(PermissionStatus::Denied)
    }

    /// Camera that answers with `status`.
    #[must_use]
    pub fn answering(status: PermissionStatus) -> Self {
        Self {
            status,
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of permission prompts shown (shared between clones).
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Default for MockCameraAccess {
    fn default() -> Self {
        Self::granting()
    }
}

impl CameraAccess for MockCameraAccess {
    fn request_permission(&self) -> impl Future<Output = PermissionStatus> + Send {
        let requests = Arc::clone(&self.requests);
        let status = self.status;

        async move {
            requests.fetch_add(1, Ordering::SeqCst);
            status
        }
    }
}
