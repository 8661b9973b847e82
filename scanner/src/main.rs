//! Scan station.
//!
//! Terminal front end for a ticket-checking station. Each line read from
//! stdin is treated as the text decoded from one QR code; the result card
//! is printed to stdout.
//!
//! # Usage
//!
//! ```bash
//! # Point at a local verification service
//! SCAN_API_BASE_URL=http://127.0.0.1:8080 cargo run --bin scan-station
//!
//! # Feed a barcode scanner in keyboard mode, or type codes by hand
//! {"uniq_id":"abc123"}
//! ```

use anyhow::Context;
use std::time::Duration;
use ticket_scan::access::policy_from_config;
use ticket_scan::station::{self, StationOptions};
use ticket_scan::{
    Config, FixedCameraAccess, HttpTicketVerifier, ScanEnvironment, ScanSession, SystemClock,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long to wait for the permission prompt and for pending work at exit
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = Config::from_env().context("invalid station configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.station.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        endpoint = %config.verification.endpoint(),
        camera = ?config.station.camera_permission,
        distinguish_failures = config.station.distinguish_failures,
        "Configuration loaded"
    );

    policy_from_config(&config.access)
        .authorize(config.access.operator_pin.as_deref())
        .context("operator not authorized")?;

    let verifier = HttpTicketVerifier::from_config(&config.verification)?;
    let environment = ScanEnvironment::new(
        FixedCameraAccess::new(config.station.camera_permission),
        verifier,
        SystemClock,
    );

    let session = ScanSession::start(environment).await?;
    let options = StationOptions {
        distinguish_failures: config.station.distinguish_failures,
        settle_timeout: SETTLE_TIMEOUT,
    };
    let interrupted = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "Could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    let exit = station::run(
        &session,
        tokio::io::stdin(),
        tokio::io::stdout(),
        interrupted,
        options,
    )
    .await?;
    info!(?exit, "Scan station exiting");

    Ok(())
}
