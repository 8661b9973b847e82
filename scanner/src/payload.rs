//! Decoding scanned QR text into a verification request.
//!
//! Decoding is pure: the same text always yields the same request or the
//! same error, and nothing here touches the network.

use crate::error::{Result, ScanError};
use crate::state::{TicketId, VerificationRequest};
use serde_json::Value;

/// Field holding the ticket identifier
pub const IDENTIFIER_FIELD: &str = "uniq_id";

/// Turn scanned text into a verification request.
///
/// Surrounding whitespace is ignored; camera decoders like to append a
/// newline.
///
/// # Errors
///
/// - [`ScanError::MalformedPayload`] if the text is not a JSON object, or its
///   `uniq_id` is neither a string nor a number
/// - [`ScanError::MissingIdentifier`] if the object has no `uniq_id`, or it is `null`
pub fn decode_payload(raw: &str) -> Result<VerificationRequest> {
    let Ok(Value::Object(mut object)) = serde_json::from_str::<Value>(raw.trim()) else {
        return Err(ScanError::MalformedPayload);
    };

    let uniq_id = match object.remove(IDENTIFIER_FIELD) {
        None | Some(Value::Null) => return Err(ScanError::MissingIdentifier),
        Some(Value::String(text)) => TicketId::Text(text),
        Some(Value::Number(number)) => TicketId::Number(number),
        Some(_) => return Err(ScanError::MalformedPayload),
    };

    Ok(VerificationRequest { uniq_id })
}
