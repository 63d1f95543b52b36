//! Hour totals derived from the session log.
//!
//! Totals are never stored. Every snapshot from a store is aggregated from
//! scratch in a single pass, so the result depends only on the collection and
//! the roster, never on the order of the sessions.

use serde::Serialize;
use tracing::debug;

use crate::roster::Roster;
use crate::session::{Session, SessionType};

/// Hours split by session type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TypeTotals {
    /// Instructional hours.
    pub instructional: f64,
    /// Non-instructional hours.
    pub non_instructional: f64,
}

impl TypeTotals {
    /// Sum of both types.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.instructional + self.non_instructional
    }

    fn add(&mut self, session_type: &SessionType, hours: f64) {
        match session_type {
            SessionType::Instructional => self.instructional += hours,
            SessionType::NonInstructional => self.non_instructional += hours,
            SessionType::Other(_) => {}
        }
    }
}

/// Totals for one known instructor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstructorTotals {
    /// Instructor name, as listed on the roster.
    pub name: String,
    /// Hours by type.
    #[serde(flatten)]
    pub hours: TypeTotals,
}

/// Sessions left out of some totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Exclusions {
    /// Sessions whose type is not recognized; counted nowhere.
    pub unrecognized_type: usize,
    /// Sessions by instructors not on the roster; counted only globally.
    pub unknown_instructor: usize,
}

impl Exclusions {
    /// Check whether anything was excluded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.unrecognized_type == 0 && self.unknown_instructor == 0
    }
}

/// Aggregated hours over a whole session collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateTotals {
    /// Hours across all instructors.
    pub totals: TypeTotals,
    /// One entry per known instructor, in roster order.
    pub per_instructor: Vec<InstructorTotals>,
    /// What the totals left out.
    pub excluded: Exclusions,
}

impl AggregateTotals {
    /// Totals with every known instructor seeded at zero.
    #[must_use]
    pub fn zeroed(roster: &Roster) -> Self {
        Self {
            totals: TypeTotals::default(),
            per_instructor: roster
                .names()
                .map(|name| InstructorTotals {
                    name: name.to_string(),
                    hours: TypeTotals::default(),
                })
                .collect(),
            excluded: Exclusions::default(),
        }
    }

    /// Total instructional hours.
    #[must_use]
    pub fn total_instructional(&self) -> f64 {
        self.totals.instructional
    }

    /// Total non-instructional hours.
    #[must_use]
    pub fn total_non_instructional(&self) -> f64 {
        self.totals.non_instructional
    }

    /// Hours of both types across everyone.
    #[must_use]
    pub fn grand_total(&self) -> f64 {
        self.totals.total()
    }

    /// Look up a known instructor's totals.
    #[must_use]
    pub fn instructor(&self, name: &str) -> Option<&TypeTotals> {
        self.per_instructor
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| &entry.hours)
    }
}

/// Aggregate a session collection against the roster.
///
/// Each session adds its duration to the global total for its type, and to
/// its instructor's totals when the instructor is on the roster. Sessions with
/// an unrecognized type contribute nothing. Neither exclusion is an error;
/// both are counted in [`AggregateTotals::excluded`].
#[must_use]
pub fn aggregate<'a, I>(sessions: I, roster: &Roster) -> AggregateTotals
where
    I: IntoIterator<Item = &'a Session>,
{
    let mut result = AggregateTotals::zeroed(roster);

    for session in sessions {
        if !session.session_type.is_recognized() {
            result.excluded.unrecognized_type += 1;
            continue;
        }

        result
            .totals
            .add(&session.session_type, session.duration_hours);

        match result
            .per_instructor
            .iter_mut()
            .find(|entry| entry.name == session.instructor_name)
        {
            Some(entry) => entry
                .hours
                .add(&session.session_type, session.duration_hours),
            None => result.excluded.unknown_instructor += 1,
        }
    }

    if !result.excluded.is_empty() {
        debug!(
            unrecognized_type = result.excluded.unrecognized_type,
            unknown_instructor = result.excluded.unknown_instructor,
            "Some sessions were left out of the totals"
        );
    }

    result
}
