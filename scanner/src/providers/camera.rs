//! Camera permission decided ahead of time.

use super::CameraAccess;
use crate::state::PermissionStatus;
use std::future::Future;

/// Answers the permission prompt with a preconfigured status.
///
/// Used by the terminal station, where there is no platform prompt and the
/// operator sets `SCAN_CAMERA_PERMISSION` instead.
///
/// ```
/// # tokio_test::block_on(async {
/// use ticket_scan::{CameraAccess, FixedCameraAccess, PermissionStatus};
///
/// let camera = FixedCameraAccess::new(PermissionStatus::Denied);
/// assert_eq!(camera.request_permission().await, PermissionStatus::Denied);
/// # });
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FixedCameraAccess {
    status: PermissionStatus,
}

impl FixedCameraAccess {
    /// Create a camera that answers with `status`
    #[must_use]
    pub const fn new(status: PermissionStatus) -> Self {
        Self { status }
    }
}

impl CameraAccess for FixedCameraAccess {
    fn request_permission(&self) -> impl Future<Output = PermissionStatus> + Send {
        let status = self.status;
        async move {
            tracing::info!(?status, "Camera permission answered from configuration");
            status
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_answers_configured_status() {
        let granted = FixedCameraAccess::new(PermissionStatus::Granted);
        let denied = FixedCameraAccess::new(PermissionStatus::Denied);

        assert_eq!(granted.request_permission().await, PermissionStatus::Granted);
        assert_eq!(denied.request_permission().await, PermissionStatus::Denied);
    }
}
