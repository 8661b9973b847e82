//! The scan session as seen by a screen.
//!
//! [`ScanSession`] wraps the Store with one method per user gesture or
//! decoder callback, plus read access for rendering.

use crate::actions::ScanAction;
use crate::environment::ScanEnvironment;
use crate::providers::{CameraAccess, TicketVerifier};
use crate::reducer::ScanReducer;
use crate::state::{ScanState, SessionPhase};
use std::time::Duration;
use ticket_scan_core::environment::Clock;
use ticket_scan_runtime::{EffectHandle, Store, StoreError};
use tokio::sync::broadcast;

/// Store running a scan session
pub type ScanStore<C, V, K> =
    Store<ScanState, ScanAction, ScanEnvironment<C, V, K>, ScanReducer<C, V, K>>;

/// One scan screen, from activation to teardown.
///
/// Cloning yields another handle to the same session.
///
/// # Example
///
/// ```ignore
/// let session = ScanSession::start(environment).await?;
/// session.settle(Duration::from_secs(5)).await?;
///
/// session.arm().await?;
/// session.code_decoded(raw).await?.wait().await;
/// render(session.snapshot().await.last_outcome);
///
/// session.teardown().await;
/// ```
pub struct ScanSession<C, V, K>
where
    C: CameraAccess + Clone + 'static,
    V: TicketVerifier + Clone + 'static,
    K: Clock + 'static,
{
    store: ScanStore<C, V, K>,
}

impl<C, V, K> ScanSession<C, V, K>
where
    C: CameraAccess + Clone + 'static,
    V: TicketVerifier + Clone + 'static,
    K: Clock + 'static,
{
    /// Create the session and issue the permission prompt.
    ///
    /// Returns right away; the session sits in
    /// [`SessionPhase::AwaitingPermission`] until the prompt is answered.
    ///
    /// # Errors
    ///
    /// Never fails for a fresh store; the `Result` mirrors [`Store::send`].
    pub async fn start(environment: ScanEnvironment<C, V, K>) -> Result<Self, StoreError> {
        let store = Store::new(ScanState::default(), ScanReducer::new(), environment);
        store.send(ScanAction::StartSession).await?;

        tracing::info!("Scan session started");
        Ok(Self { store })
    }

    /// Turn the camera on. Ignored without permission.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SessionTornDown`] after [`ScanSession::teardown`].
    pub async fn arm(&self) -> Result<(), StoreError> {
        self.store.send(ScanAction::Arm).await.map(drop)
    }

    /// Turn the camera off. A verification in flight still completes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SessionTornDown`] after [`ScanSession::teardown`].
    pub async fn disarm(&self) -> Result<(), StoreError> {
        self.store.send(ScanAction::Disarm).await.map(drop)
    }

    /// Dismiss the result and accept the next code.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SessionTornDown`] after [`ScanSession::teardown`].
    pub async fn scan_again(&self) -> Result<(), StoreError> {
        self.store.send(ScanAction::ScanAgain).await.map(drop)
    }

    /// Hand a decoded string to the session.
    ///
    /// The returned handle completes once the verification it started, if
    /// any, has been applied.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SessionTornDown`] after [`ScanSession::teardown`].
    pub async fn code_decoded(&self, raw: impl Into<String>) -> Result<EffectHandle, StoreError> {
        self.store.send(ScanAction::decoded(raw)).await
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> ScanState {
        self.store.state(ScanState::clone).await
    }

    /// Current phase
    pub async fn phase(&self) -> SessionPhase {
        self.store.state(ScanState::phase).await
    }

    /// Events fed back by permission prompts and verifications.
    ///
    /// Each event arrives after it was applied: reading the phase on
    /// receipt already shows its result.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ScanAction> {
        self.store.subscribe_actions()
    }

    /// Wait for outstanding prompts and verifications.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if work is still running after `timeout`.
    pub async fn settle(&self, timeout: Duration) -> Result<(), StoreError> {
        self.store.wait_idle(timeout).await
    }

    /// End the session.
    ///
    /// Outstanding work is dropped and its results are never applied; every
    /// later call fails with [`StoreError::SessionTornDown`].
    pub async fn teardown(&self) {
        self.store.teardown().await;
        tracing::info!("Scan session torn down");
    }

    /// Underlying store
    #[must_use]
    pub const fn store(&self) -> &ScanStore<C, V, K> {
        &self.store
    }
}

impl<C, V, K> Clone for ScanSession<C, V, K>
where
    C: CameraAccess + Clone + 'static,
    V: TicketVerifier + Clone + 'static,
    K: Clock + 'static,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}
