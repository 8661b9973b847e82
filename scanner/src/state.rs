//! Scan session state and the values it carries.

use crate::error::ScanError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Permission
// ============================================================================

/// Answer of the platform permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    /// Camera capture allowed
    Granted,
    /// Camera capture refused
    Denied,
}

impl FromStr for PermissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "granted" => Ok(Self::Granted),
            "denied" => Ok(Self::Denied),
            other => Err(format!("expected `granted` or `denied`, got `{other}`")),
        }
    }
}

/// Camera permission as seen by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Permission {
    /// Prompt not answered yet
    #[default]
    Unknown,
    /// Camera capture allowed
    Granted,
    /// Camera capture refused; terminal
    Denied,
}

impl From<PermissionStatus> for Permission {
    fn from(status: PermissionStatus) -> Self {
        match status {
            PermissionStatus::Granted => Self::Granted,
            PermissionStatus::Denied => Self::Denied,
        }
    }
}

// ============================================================================
// Ticket identifier & request
// ============================================================================

/// Opaque ticket identifier taken from a QR code.
///
/// Kept exactly as scanned (string or number) and sent back the same way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TicketId {
    /// `"uniq_id": "abc123"`
    Text(String),
    /// `"uniq_id": 4211`
    Number(serde_json::Number),
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(number) => write!(f, "{number}"),
        }
    }
}

/// Body of a verification call: `{"uniq_id": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    /// Identifier to check
    pub uniq_id: TicketId,
}

// ============================================================================
// Ticket details
// ============================================================================

/// Travel record of an accepted ticket.
///
/// The reservation service owns this shape and is not strict about it, so
/// every field is optional: a missing field reads as empty and a date that
/// is not recognised is kept as sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketDetails {
    /// Origin city
    #[serde(default)]
    pub from: String,
    /// Destination city
    #[serde(default)]
    pub to: String,
    /// Travel date
    #[serde(default)]
    pub date: TravelDate,
    /// Passenger first name
    #[serde(default)]
    pub name: String,
    /// Passenger surname
    #[serde(default)]
    pub surname: String,
}

impl TicketDetails {
    /// "Name Surname", skipping whichever part is missing
    #[must_use]
    pub fn passenger(&self) -> String {
        [self.name.trim(), self.surname.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Date of travel as sent by the reservation service.
///
/// ISO-8601 strings are read into a UTC timestamp. Accepted shapes:
/// - RFC 3339 (`2024-05-01T08:00:00Z`, `2024-05-01T08:00:00+03:00`)
/// - a space instead of `T` (`2024-05-01 08:00:00`)
/// - offsets without a colon (`2024-05-01T08:00:00+0300`)
/// - no seconds (`2024-05-01T08:00Z`)
/// - no zone, read as UTC (`2024-05-01T08:00:00`)
/// - a bare date, midnight UTC (`2024-05-01`)
///
/// Anything else is kept verbatim and shown as sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TravelDate {
    /// Recognised timestamp
    Known(DateTime<Utc>),
    /// Text that is not a recognised date
    Verbatim(String),
}

/// Shapes tried after RFC 3339, with an explicit offset
const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M%z",
];

/// Shapes read as UTC, either zoneless or with the `Z` already stripped
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

impl TravelDate {
    /// Read a date sent by the service, keeping it verbatim when unrecognised.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self::parse_timestamp(raw).map_or_else(|| Self::Verbatim(raw.to_string()), Self::Known)
    }

    /// Parse an ISO-8601 date in any of the accepted shapes.
    #[must_use]
    pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();

        if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
            return Some(timestamp.with_timezone(&Utc));
        }

        for format in OFFSET_FORMATS {
            if let Ok(timestamp) = DateTime::parse_from_str(raw, format) {
                return Some(timestamp.with_timezone(&Utc));
            }
        }

        let naive = raw
            .strip_suffix('Z')
            .or_else(|| raw.strip_suffix('z'))
            .unwrap_or(raw);
        for format in NAIVE_FORMATS {
            if let Ok(timestamp) = NaiveDateTime::parse_from_str(naive, format) {
                return Some(timestamp.and_utc());
            }
        }

        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|timestamp| timestamp.and_utc())
    }

    /// The timestamp, when the date was recognised
    #[must_use]
    pub const fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Known(timestamp) => Some(*timestamp),
            Self::Verbatim(_) => None,
        }
    }
}

impl Default for TravelDate {
    fn default() -> Self {
        Self::Verbatim(String::new())
    }
}

impl fmt::Display for TravelDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(timestamp) => write!(f, "{}", timestamp.format("%d.%m.%Y")),
            Self::Verbatim(raw) => f.write_str(raw),
        }
    }
}

impl Serialize for TravelDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Known(timestamp) => serializer.serialize_str(&timestamp.to_rfc3339()),
            Self::Verbatim(raw) => serializer.serialize_str(raw),
        }
    }
}

impl<'de> Deserialize<'de> for TravelDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map_or_else(Self::default, |raw| Self::parse(&raw)))
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Result of the last scan attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Outcome {
    /// Nothing to show
    #[default]
    None,
    /// Ticket verified, with its travel record when the service sent one
    Accepted(Option<TicketDetails>),
    /// Ticket refused, locally or remotely
    Rejected(ScanError),
}

/// Shown on an accepted ticket without a travel record
pub const NO_DETAILS: &str = "No reservation details available";

impl Outcome {
    /// `true` for [`Outcome::None`]
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Details of an accepted ticket
    #[must_use]
    pub const fn details(&self) -> Option<&TicketDetails> {
        match self {
            Self::Accepted(details) => details.as_ref(),
            _ => None,
        }
    }

    /// Reason of a rejection
    #[must_use]
    pub const fn rejection(&self) -> Option<&ScanError> {
        match self {
            Self::Rejected(reason) => Some(reason),
            _ => None,
        }
    }

    /// Title shown above the result
    #[must_use]
    pub const fn headline(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Accepted(_) => Some("Done"),
            Self::Rejected(_) => Some("Error"),
        }
    }

    /// Lines of the result card, headline first.
    #[must_use]
    pub fn summary_lines(&self, distinguish_failures: bool) -> Vec<String> {
        let Some(headline) = self.headline() else {
            return Vec::new();
        };

        let mut lines = vec![headline.to_string()];
        match self {
            Self::None => {},
            Self::Accepted(Some(details)) => lines.extend([
                format!("From: {}", details.from),
                format!("To: {}", details.to),
                format!("Date: {}", details.date),
                format!("Name: {}", details.passenger()),
            ]),
            Self::Accepted(None) => lines.push(NO_DETAILS.to_string()),
            Self::Rejected(reason) => {
                lines.push(reason.user_message(distinguish_failures).to_string());
            },
        }
        lines
    }
}

// ============================================================================
// Session
// ============================================================================

/// Where the session stands, derived from [`ScanState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Permission prompt not answered
    AwaitingPermission,
    /// Permission refused; nothing else will happen
    Denied,
    /// Camera off, ready to arm
    Idle,
    /// Camera feeding the decoder
    Armed,
    /// A decoded ticket is being verified
    Verifying,
    /// An outcome is on screen until "scan again"
    Resolved,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::AwaitingPermission => "awaiting permission",
            Self::Denied => "denied",
            Self::Idle => "idle",
            Self::Armed => "armed",
            Self::Verifying => "verifying",
            Self::Resolved => "resolved",
        };
        f.write_str(label)
    }
}

/// State of one scan screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanState {
    /// Camera permission, set once
    pub permission: Permission,
    /// Whether the prompt was already issued this session
    pub permission_requested: bool,
    /// Camera actively decoding
    pub camera_armed: bool,
    /// Decode events are ignored while set
    pub locked: bool,
    /// Request currently being verified
    pub in_flight: Option<VerificationRequest>,
    /// Last scan result
    pub last_outcome: Outcome,
    /// When `last_outcome` was set
    pub resolved_at: Option<DateTime<Utc>>,
    /// Verification calls issued this session
    pub verifications: u64,
}

impl ScanState {
    /// Current phase
    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        match self.permission {
            Permission::Unknown => SessionPhase::AwaitingPermission,
            Permission::Denied => SessionPhase::Denied,
            Permission::Granted => {
                if self.in_flight.is_some() {
                    SessionPhase::Verifying
                } else if !self.last_outcome.is_none() {
                    SessionPhase::Resolved
                } else if self.camera_armed {
                    SessionPhase::Armed
                } else {
                    SessionPhase::Idle
                }
            },
        }
    }

    /// Whether the session invariants hold:
    /// - the camera is only armed with permission
    /// - the lock is held exactly while a result is shown or a call is in flight
    /// - a call in flight never coexists with a shown result
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        let armed_ok = !self.camera_armed || matches!(self.permission, Permission::Granted);
        let busy = self.in_flight.is_some() || !self.last_outcome.is_none();
        let exclusive = self.in_flight.is_none() || self.last_outcome.is_none();

        armed_ok && self.locked == busy && exclusive
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn details() -> TicketDetails {
        TicketDetails {
            from: "Chișinău".into(),
            to: "Iași".into(),
            date: TravelDate::parse("2024-05-01T08:00:00Z"),
            name: "Ana".into(),
            surname: "Pop".into(),
        }
    }

    #[test]
    fn test_travel_date_shapes() {
        let midnight = TravelDate::parse_timestamp("2024-05-01T00:00:00Z").unwrap();
        let morning = TravelDate::parse_timestamp("2024-05-01T08:00:00Z").unwrap();

        assert_eq!(TravelDate::parse_timestamp("2024-05-01"), Some(midnight));
        assert_eq!(TravelDate::parse_timestamp("2024-05-01T00:00:00"), Some(midnight));
        assert_eq!(TravelDate::parse_timestamp("2024-05-01T03:00:00+03:00"), Some(midnight));
        assert_eq!(TravelDate::parse_timestamp("2024-05-01T11:00:00+0300"), Some(morning));
        assert_eq!(TravelDate::parse_timestamp("2024-05-01 08:00:00"), Some(morning));
        assert_eq!(
            TravelDate::parse_timestamp("2024-05-01 08:00:00.250"),
            Some(morning + chrono::Duration::milliseconds(250))
        );
        assert_eq!(TravelDate::parse_timestamp("2024-05-01T08:00Z"), Some(morning));
        assert_eq!(TravelDate::parse_timestamp("2024-05-01T08:00"), Some(morning));
        assert_eq!(TravelDate::parse_timestamp("01/05/2024"), None);
    }

    #[test]
    fn test_unrecognised_travel_date_is_kept_verbatim() {
        let date = TravelDate::parse("1 May, morning train");

        assert_eq!(date, TravelDate::Verbatim("1 May, morning train".into()));
        assert_eq!(date.timestamp(), None);
        assert_eq!(date.to_string(), "1 May, morning train");
        assert_eq!(serde_json::to_string(&date).unwrap(), r#""1 May, morning train""#);
    }

    #[test]
    fn test_ticket_details_ignore_extra_fields() {
        let json = r#"{
            "from": "Chișinău", "to": "Iași", "date": "2024-05-01T08:00:00Z",
            "name": "Ana", "surname": "Pop", "phone": "+373 000", "isStudent": false
        }"#;

        let parsed: TicketDetails = serde_json::from_str(json).unwrap();

        assert_eq!(parsed, details());
        assert_eq!(parsed.passenger(), "Ana Pop");
    }

    #[test]
    fn test_ticket_details_tolerate_missing_fields() {
        let json = r#"{"from": "Chișinău", "to": "Iași", "date": null, "name": "Ana"}"#;

        let parsed: TicketDetails = serde_json::from_str(json).unwrap();

        assert_eq!(parsed.surname, "");
        assert_eq!(parsed.date, TravelDate::default());
        assert_eq!(parsed.passenger(), "Ana");
    }

    #[test]
    fn test_ticket_id_round_trips_shape() {
        let text: VerificationRequest = serde_json::from_str(r#"{"uniq_id":"abc123"}"#).unwrap();
        let number: VerificationRequest = serde_json::from_str(r#"{"uniq_id":4211}"#).unwrap();

        assert_eq!(serde_json::to_string(&text).unwrap(), r#"{"uniq_id":"abc123"}"#);
        assert_eq!(serde_json::to_string(&number).unwrap(), r#"{"uniq_id":4211}"#);
        assert_eq!(number.uniq_id.to_string(), "4211");
    }

    #[test]
    fn test_phase_derivation() {
        let mut state = ScanState::default();
        assert_eq!(state.phase(), SessionPhase::AwaitingPermission);

        state.permission = Permission::Granted;
        assert_eq!(state.phase(), SessionPhase::Idle);

        state.camera_armed = true;
        assert_eq!(state.phase(), SessionPhase::Armed);

        state.locked = true;
        state.last_outcome = Outcome::Accepted(Some(details()));
        assert_eq!(state.phase(), SessionPhase::Resolved);
        assert!(state.is_consistent());

        state.permission = Permission::Denied;
        assert_eq!(state.phase(), SessionPhase::Denied);
    }

    #[test]
    fn test_lock_without_reason_is_inconsistent() {
        let state = ScanState {
            permission: Permission::Granted,
            locked: true,
            ..ScanState::default()
        };

        assert!(!state.is_consistent());
    }

    #[test]
    fn test_summary_lines() {
        let accepted = Outcome::Accepted(Some(details())).summary_lines(false);
        assert_eq!(
            accepted,
            vec!["Done", "From: Chișinău", "To: Iași", "Date: 01.05.2024", "Name: Ana Pop"]
        );

        let bare = Outcome::Accepted(None).summary_lines(false);
        assert_eq!(bare, vec!["Done", NO_DETAILS]);

        let rejected = Outcome::Rejected(ScanError::MalformedPayload).summary_lines(true);
        assert_eq!(rejected, vec!["Error", "This QR code is not a ticket"]);

        assert!(Outcome::None.summary_lines(false).is_empty());
    }

    #[test]
    fn test_headline_leads_the_card() {
        let outcomes = [
            Outcome::Accepted(Some(details())),
            Outcome::Accepted(None),
            Outcome::Rejected(ScanError::VerificationRejected { status: 404 }),
        ];

        for outcome in outcomes {
            let lines = outcome.summary_lines(false);
            assert_eq!(lines.first().map(String::as_str), outcome.headline());
        }
        assert_eq!(Outcome::Accepted(None).headline(), Some("Done"));
        assert_eq!(Outcome::Rejected(ScanError::MalformedPayload).headline(), Some("Error"));
        assert_eq!(Outcome::None.headline(), None);
    }

    #[test]
    fn test_verbatim_date_is_shown_as_sent() {
        let details = TicketDetails {
            date: TravelDate::parse("next tuesday"),
            ..details()
        };

        let lines = Outcome::Accepted(Some(details)).summary_lines(false);

        assert_eq!(lines[3], "Date: next tuesday");
    }

    #[test]
    fn test_permission_status_from_str() {
        assert_eq!(" Granted ".parse::<PermissionStatus>(), Ok(PermissionStatus::Granted));
        assert_eq!("denied".parse::<PermissionStatus>(), Ok(PermissionStatus::Denied));
        assert!("maybe".parse::<PermissionStatus>().is_err());
    }
}
