//! Verification service client

use super::TicketVerifier;
use crate::config::{ConfigError, VerificationConfig};
use crate::error::{Result, ScanError};
use crate::state::{TicketDetails, VerificationRequest};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::error::Error as _;
use std::fmt;
use std::future::Future;

/// Why a 200 answer came without a usable travel record
#[derive(Debug)]
enum MissingTravel {
    /// Body is not JSON
    NotJson(serde_json::Error),
    /// No `travel` key, or it is null
    Absent,
    /// `travel` present but not a travel record
    Unusable(serde_json::Error),
}

impl fmt::Display for MissingTravel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotJson(error) => write!(f, "body is not JSON: {error}"),
            Self::Absent => f.write_str("no travel record"),
            Self::Unusable(error) => write!(f, "travel record unusable: {error}"),
        }
    }
}

/// Pull the travel record out of a 200 body. Other keys are ignored.
fn read_travel(body: &[u8]) -> std::result::Result<TicketDetails, MissingTravel> {
    let value: serde_json::Value = serde_json::from_slice(body).map_err(MissingTravel::NotJson)?;
    let travel = value
        .get("travel")
        .filter(|travel| !travel.is_null())
        .ok_or(MissingTravel::Absent)?;
    TicketDetails::deserialize(travel).map_err(MissingTravel::Unusable)
}

/// Error text followed by its cause chain.
fn describe(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut cause = error.source();
    while let Some(inner) = cause {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        cause = inner.source();
    }
    message
}

/// Verification service client
#[derive(Debug, Clone)]
pub struct HttpTicketVerifier {
    client: Client,
    endpoint: String,
}

impl HttpTicketVerifier {
    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HttpClient`] if the HTTP client can't be built
    pub fn from_config(config: &VerificationConfig) -> std::result::Result<Self, ConfigError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
        })
    }

    /// Create a client for `base_url` with the default route and no timeout
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let config = VerificationConfig {
            base_url: base_url.into(),
            ..VerificationConfig::default()
        };

        Self {
            client: Client::new(),
            endpoint: config.endpoint(),
        }
    }

    /// Full URL requests are sent to
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, request: &VerificationRequest) -> Result<Option<TicketDetails>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                let message = describe(&e);
                tracing::warn!(error = %message, "Verification request failed");
                ScanError::TransportFailure(message)
            })?;

        match response.status() {
            StatusCode::OK => {
                let body = response.bytes().await.map_err(|e| {
                    let message = describe(&e);
                    tracing::warn!(error = %message, "Verification answer cut short");
                    ScanError::InvalidResponse(message)
                })?;

                tracing::info!(uniq_id = %request.uniq_id, "Ticket accepted");
                match read_travel(&body) {
                    Ok(details) => Ok(Some(details)),
                    Err(reason) => {
                        tracing::warn!(
                            uniq_id = %request.uniq_id,
                            %reason,
                            "Accepted without travel details"
                        );
                        Ok(None)
                    },
                }
            },
            status => {
                tracing::info!(
                    uniq_id = %request.uniq_id,
                    status = status.as_u16(),
                    "Ticket rejected"
                );
                Err(ScanError::VerificationRejected {
                    status: status.as_u16(),
                })
            },
        }
    }
}

impl TicketVerifier for HttpTicketVerifier {
    fn verify(
        &self,
        request: &VerificationRequest,
    ) -> impl Future<Output = Result<Option<TicketDetails>>> + Send {
        let verifier = self.clone();
        let request = request.clone();
        async move {
            tracing::debug!(endpoint = %verifier.endpoint, uniq_id = %request.uniq_id, "Verifying ticket");
            verifier.post(&request).await
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_endpoint_from_config() {
        let config = VerificationConfig {
            base_url: "http://localhost:9000/".to_string(),
            verify_path: "/verify-ticket".to_string(),
            timeout_secs: Some(3),
        };

        let verifier = HttpTicketVerifier::from_config(&config).unwrap();

        assert_eq!(verifier.endpoint(), "http://localhost:9000/verify-ticket");
    }

    #[test]
    fn test_new_uses_default_route() {
        let verifier = HttpTicketVerifier::new("https://tickets.example");
        assert_eq!(verifier.endpoint(), "https://tickets.example/verify-ticket");
    }

    #[test]
    fn test_travel_ignores_extra_fields() {
        let body = r#"{
            "ok": true,
            "travel": {
                "from": "Chișinău", "to": "Iași", "date": "2024-05-01",
                "name": "Ana", "surname": "Pop", "seat": 14
            }
        }"#
        .as_bytes();

        let travel = read_travel(body).unwrap();

        assert_eq!(travel.from, "Chișinău");
        assert_eq!(travel.passenger(), "Ana Pop");
    }

    #[test]
    fn test_missing_travel_reasons() {
        assert!(matches!(read_travel(br#"{"ok":true}"#), Err(MissingTravel::Absent)));
        assert!(matches!(read_travel(br#"{"travel":null}"#), Err(MissingTravel::Absent)));
        assert!(matches!(read_travel(b"<html>ok</html>"), Err(MissingTravel::NotJson(_))));
    }

    #[test]
    fn test_unusable_travel_names_the_serde_error() {
        let reason = read_travel(br#"{"travel":{"from":12}}"#).unwrap_err();

        assert!(matches!(reason, MissingTravel::Unusable(_)));
        assert!(reason.to_string().contains("invalid type: integer `12`"), "{reason}");
    }

    #[tokio::test]
    async fn test_error_description_includes_cause() {
        let error = Client::new()
            .post("http://127.0.0.1:1/verify-ticket")
            .send()
            .await
            .unwrap_err();

        let message = describe(&error);

        assert!(error.source().is_some());
        assert!(message.starts_with(&error.to_string()));
        assert!(message.len() > error.to_string().len(), "{message}");
    }
}
