//! Wire types for the upstream reservation API.
//!
//! Facilities arrive as opaque JSON objects whose attribute set is owned by
//! the upstream service; only the identifying key and the country attribute
//! have meaning here. Everything else is passed through unchanged, so that
//! upstream schema additions survive the proxy without code changes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Attribute key carrying the facility identifier in listing objects.
pub const ID_KEY: &str = "hutId";

/// Attribute key carrying the facility's country code.
pub const COUNTRY_KEY: &str = "hutCountry";

/// Attribute key written by the engine when an availability window was
/// requested.
pub const AVAILABLE_KEY: &str = "isAvailable";

/// Date format accepted for caller-supplied window boundaries.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// An opaque facility attribute map, exactly the upstream JSON object shape.
pub type AttrMap = serde_json::Map<String, JsonValue>;

/// Normalizes the identifying key of a facility to a string.
///
/// The upstream is inconsistent about the id's JSON type: most listings carry
/// a number, some a string. Integers are printed without a decimal point,
/// floats are rounded to zero decimals. A missing, null, empty, or otherwise
/// unusable id yields `None` and the facility is dropped from the run.
pub fn facility_id(attrs: &AttrMap) -> Option<String> {
    match attrs.get(ID_KEY)? {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                n.as_f64().map(|f| format!("{f:.0}"))
            }
        }
        _ => None,
    }
}

/// Returns the facility's country attribute, if it is a string.
pub fn facility_country(attrs: &AttrMap) -> Option<&str> {
    attrs.get(COUNTRY_KEY)?.as_str()
}

/// One day's remaining capacity for a facility, as returned by the
/// availability endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityDay {
    #[serde(rename = "freeBeds")]
    pub free_beds: i64,

    /// RFC 3339 timestamp; only the calendar date is significant.
    pub date: DateTime<Utc>,
}

/// Errors rejecting caller-supplied window parameters before the engine runs.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum WindowError {
    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    BadDate(String),

    #[error("endDate cannot be before startDate")]
    EndBeforeStart,

    #[error("invalid bed count {0:?}, expected a positive integer")]
    BadBedCount(String),
}

/// A caller-requested stay: an inclusive date range and the minimum number of
/// free beds every night of the range must offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StayWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub required_beds: u32,
}

impl StayWindow {
    /// Parses and validates caller-supplied strings.
    ///
    /// Dates must be `YYYY-MM-DD`, the end must not precede the start, and
    /// the bed count must be a positive integer.
    pub fn parse(start: &str, end: &str, beds: &str) -> Result<Self, WindowError> {
        let start_date = NaiveDate::parse_from_str(start, DATE_FORMAT)
            .map_err(|_| WindowError::BadDate(start.to_string()))?;
        let end_date = NaiveDate::parse_from_str(end, DATE_FORMAT)
            .map_err(|_| WindowError::BadDate(end.to_string()))?;

        if end_date < start_date {
            return Err(WindowError::EndBeforeStart);
        }

        let required_beds: u32 = beds
            .parse()
            .map_err(|_| WindowError::BadBedCount(beds.to_string()))?;
        if required_beds == 0 {
            return Err(WindowError::BadBedCount(beds.to_string()));
        }

        Ok(Self {
            start: start_date,
            end: end_date,
            required_beds,
        })
    }
}
