//! Mock ticket verifier for testing.

use crate::error::{Result, ScanError};
use crate::providers::TicketVerifier;
use crate::state::{TicketDetails, VerificationRequest};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;

/// Mock ticket verifier.
///
/// Returns a scripted result and records every request. A gated verifier
/// holds each call until [`MockTicketVerifier::release`] is called, which
/// lets tests act while a verification is in flight.
#[derive(Debug, Clone)]
pub struct MockTicketVerifier {
    result: Arc<Mutex<Result<Option<TicketDetails>>>>,
    calls: Arc<Mutex<Vec<VerificationRequest>>>,
    gate: Option<Arc<Notify>>,
}

impl MockTicketVerifier {
    /// Verifier that accepts every ticket with `details`.
    #[must_use]
    pub fn accepting(details: TicketDetails) -> Self {
        Self::answering(Ok(Some(details)))
    }

    /// Verifier that accepts every ticket without a travel record.
    #[must_use]
    pub fn accepting_without_details() -> Self {
        Self::answering(Ok(None))
    }

    /// Verifier that refuses every ticket with `error`.
    #[must_use]
    pub fn failing(error: ScanError) -> Self {
        Self::answering(Err(error))
    }

    /// Verifier that answers with `result`.
    #[must_use]
    pub fn answering(result: Result<Option<TicketDetails>>) -> Self {
        Self {
            result: Arc::new(Mutex::new(result)),
            calls: Arc::new(Mutex::new(Vec::new())),
            gate: None,
        }
    }

    /// Hold every call until [`MockTicketVerifier::release`].
    #[must_use]
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Notify::new()));
        self
    }

    /// Let one held call finish. A release before the call arrives is kept.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    /// Change the answer for subsequent calls.
    pub fn respond_with(&self, result: Result<Option<TicketDetails>>) {
        *self.result.lock().unwrap_or_else(PoisonError::into_inner) = result;
    }

    /// Requests received so far (shared between clones).
    #[must_use]
    pub fn calls(&self) -> Vec<VerificationRequest> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of requests received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl TicketVerifier for MockTicketVerifier {
    fn verify(
        &self,
        request: &VerificationRequest,
    ) -> impl Future<Output = Result<Option<TicketDetails>>> + Send {
        let verifier = self.clone();
        let request = request.clone();

        async move {
            verifier
                .calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(request);

            if let Some(gate) = &verifier.gate {
                gate.notified().await;
            }

            verifier
                .result
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }
}
