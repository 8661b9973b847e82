//! Line-driven scan station.
//!
//! Each input line is the text decoded from one QR code and each result
//! card is written to the output. Every wait, including a verification in
//! flight, races the shutdown signal.

use crate::error::ScanError;
use crate::providers::{CameraAccess, TicketVerifier};
use crate::session::ScanSession;
use crate::state::SessionPhase;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use ticket_scan_core::environment::Clock;
use ticket_scan_runtime::StoreError;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Station behaviour knobs
#[derive(Debug, Clone, Copy)]
pub struct StationOptions {
    /// Show a distinct message per failure kind
    pub distinguish_failures: bool,
    /// How long to wait for the permission prompt and for pending work at exit
    pub settle_timeout: Duration,
}

impl Default for StationOptions {
    fn default() -> Self {
        Self {
            distinguish_failures: false,
            settle_timeout: Duration::from_secs(10),
        }
    }
}

/// Why the station stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationExit {
    /// Camera permission refused
    Denied,
    /// Input reached end of file
    InputClosed,
    /// Shutdown was requested
    Interrupted,
}

/// Station errors
#[derive(Debug, Error)]
pub enum StationError {
    /// The session refused a call or timed out
    #[error(transparent)]
    Session(#[from] StoreError),

    /// Reading codes or writing cards failed
    #[error("station I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the station until input ends or `shutdown` resolves.
///
/// Waits for the permission prompt, arms the camera and then verifies one
/// code per non-blank line. On end of input the camera is disarmed and
/// pending work gets `settle_timeout` to finish. On shutdown the session
/// is torn down at once, dropping any verification still in flight. The
/// session is torn down on every exit.
///
/// # Errors
///
/// Returns [`StationError`] when the session refuses a call, the prompt
/// does not settle in time, or input/output fails.
pub async fn run<C, V, K, R, W, F>(
    session: &ScanSession<C, V, K>,
    input: R,
    mut output: W,
    shutdown: F,
    options: StationOptions,
) -> Result<StationExit, StationError>
where
    C: CameraAccess + Clone + 'static,
    V: TicketVerifier + Clone + 'static,
    K: Clock + 'static,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    tokio::select! {
        settled = session.settle(options.settle_timeout) => settled?,
        () = &mut shutdown => {
            tracing::info!("Interrupted before the permission prompt was answered");
            session.teardown().await;
            return Ok(StationExit::Interrupted);
        }
    }

    if session.phase().await == SessionPhase::Denied {
        let message = ScanError::PermissionDenied.user_message(options.distinguish_failures);
        write_card(&mut output, &[message.to_string()]).await?;
        session.teardown().await;
        return Ok(StationExit::Denied);
    }

    session.arm().await?;
    tracing::info!("Camera armed, waiting for codes");

    let mut lines = BufReader::new(input).lines();

    let exit = loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            () = &mut shutdown => break StationExit::Interrupted,
        };

        let Some(raw) = line else {
            break StationExit::InputClosed;
        };
        if raw.trim().is_empty() {
            continue;
        }

        let mut verification = session.code_decoded(raw).await?;
        tokio::select! {
            () = verification.wait() => {},
            () = &mut shutdown => {
                tracing::info!("Interrupted during verification");
                break StationExit::Interrupted;
            }
        }

        let outcome = session.snapshot().await.last_outcome;
        write_card(&mut output, &outcome.summary_lines(options.distinguish_failures)).await?;
        session.scan_again().await?;
    };

    if exit == StationExit::InputClosed {
        session.disarm().await?;
        if let Err(error) = session.settle(options.settle_timeout).await {
            tracing::warn!(%error, "Pending verification abandoned");
        }
    }

    session.teardown().await;
    tracing::info!(?exit, "Station stopped");
    Ok(exit)
}

/// Write the lines of one card followed by a blank line.
async fn write_card<W>(output: &mut W, lines: &[String]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    for line in lines {
        output.write_all(line.as_bytes()).await?;
        output.write_all(b"\n").await?;
    }
    output.write_all(b"\n").await?;
    output.flush().await
}
