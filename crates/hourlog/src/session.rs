//! Session records and the form that creates them.
//!
//! A [`Session`] serializes to the persisted record shape shared by every
//! backend:
//!
//! ```json
//! {"name": "Aragon", "class": "Algebra I", "date": "2024-03-11",
//!  "type": "instructional", "start": "09:00", "end": "10:30",
//!  "duration": 1.5, "timestamp": "2024-03-11T10:31:02Z"}
//! ```

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::duration::{parse_clock, parse_date, session_hours, whole_minutes};
use crate::error::{Error, Result};
use crate::roster::Roster;

/// How a session's time is classified.
///
/// Records written by other clients may carry a type string this crate does
/// not recognize. Those are kept as [`SessionType::Other`] so they survive a
/// read, and the aggregator leaves them out of the type totals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SessionType {
    /// Time spent teaching.
    Instructional,
    /// Preparation, grading, meetings and other non-teaching time.
    NonInstructional,
    /// A type string that is neither of the above.
    Other(String),
}

impl SessionType {
    /// Parse a form value, rejecting anything unrecognized.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSessionType`] for unrecognized values.
    pub fn parse_strict(value: &str) -> Result<Self> {
        match Self::from(value.trim().to_string()) {
            Self::Other(value) => Err(Error::InvalidSessionType { value }),
            recognized => Ok(recognized),
        }
    }

    /// Check whether this is one of the two recognized types.
    #[must_use]
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// Human-readable label used in the log list.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Instructional => "Instructional",
            Self::NonInstructional => "Non-Instructional",
            Self::Other(value) => value,
        }
    }
}

impl From<String> for SessionType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "instructional" => Self::Instructional,
            "non-instructional" => Self::NonInstructional,
            _ => Self::Other(value),
        }
    }
}

impl From<SessionType> for String {
    fn from(value: SessionType) -> Self {
        match value {
            SessionType::Instructional => "instructional".to_string(),
            SessionType::NonInstructional => "non-instructional".to_string(),
            SessionType::Other(value) => value,
        }
    }
}

impl std::fmt::Display for SessionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Instructional => write!(f, "instructional"),
            Self::NonInstructional => write!(f, "non-instructional"),
            Self::Other(value) => write!(f, "{value}"),
        }
    }
}

/// One logged block of instructor time.
///
/// Sessions are immutable once created. Stores only ever append them or clear
/// the whole collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Instructor who taught or worked the session.
    #[serde(rename = "name")]
    pub instructor_name: String,

    /// Class the session belongs to. Empty for records logged before classes
    /// were tracked.
    #[serde(rename = "class", default)]
    pub class_name: String,

    /// Calendar date of the session.
    pub date: NaiveDate,

    /// Instructional or non-instructional.
    #[serde(rename = "type")]
    pub session_type: SessionType,

    /// Start time.
    #[serde(with = "clock")]
    pub start: NaiveTime,

    /// End time.
    #[serde(with = "clock")]
    pub end: NaiveTime,

    /// Elapsed hours, computed when the session was logged.
    #[serde(rename = "duration")]
    pub duration_hours: f64,

    /// Write time assigned by the store.
    #[serde(
        rename = "timestamp",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a session, computing its duration.
    ///
    /// Times are truncated to whole minutes first, matching the `HH:MM` form
    /// they are stored in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInterval`] when `end` is not after `start`.
    pub fn new(
        instructor_name: impl Into<String>,
        class_name: impl Into<String>,
        date: NaiveDate,
        session_type: SessionType,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<Self> {
        let start = whole_minutes(start);
        let end = whole_minutes(end);
        let duration_hours = session_hours(date, start, end)?;
        Ok(Self {
            instructor_name: instructor_name.into(),
            class_name: class_name.into(),
            date,
            session_type,
            start,
            end,
            duration_hours,
            created_at: None,
        })
    }

    /// Return a copy stamped with the store's write time.
    #[must_use]
    pub fn stamped(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }
}

/// Serde adapter for `HH:MM` clock times.
mod clock {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::duration::{parse_clock, CLOCK_FORMAT};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&time.format(CLOCK_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_clock(&raw).map_err(serde::de::Error::custom)
    }
}

/// Raw field values as entered on the logging form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionForm {
    /// Instructor name.
    pub name: String,
    /// Class name.
    pub class: String,
    /// Date, `YYYY-MM-DD`.
    pub date: String,
    /// `instructional` or `non-instructional`.
    pub session_type: String,
    /// Start time, `HH:MM`.
    pub start: String,
    /// End time, `HH:MM`.
    pub end: String,
}

impl SessionForm {
    /// Validate the form and build a session from it.
    ///
    /// Names are trimmed. Every field is required; when the roster is
    /// restricted the instructor must be on it.
    ///
    /// # Errors
    ///
    /// Returns a validation error ([`Error::is_validation_error`]) describing
    /// the first problem found.
    pub fn validate(&self, roster: &Roster) -> Result<Session> {
        let name = required("name", &self.name)?;
        let class = required("class", &self.class)?;
        let date = parse_date(required("date", &self.date)?)?;
        let session_type = SessionType::parse_strict(required("type", &self.session_type)?)?;
        let start = parse_clock(required("start", &self.start)?)?;
        let end = parse_clock(required("end", &self.end)?)?;

        if roster.restrict_to_roster && !roster.contains(name) {
            return Err(Error::UnknownInstructor {
                name: name.to_string(),
            });
        }

        Session::new(name, class, date, session_type, start, end)
    }
}

/// Return the trimmed value, or a `MissingField` error when it is blank.
fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(Error::MissingField { field })
    } else {
        Ok(trimmed)
    }
}
