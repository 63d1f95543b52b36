//! The known instructor roster.
//!
//! The roster is declared once in the configuration and shared by the
//! aggregator, which seeds per-instructor totals from it, and by form
//! validation when `restrict_to_roster` is set.

use serde::{Deserialize, Serialize};

/// The fixed set of known instructors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Roster {
    /// Instructor names, in display order.
    pub instructors: Vec<String>,
    /// Reject sessions logged for names that are not on the roster.
    pub restrict_to_roster: bool,
}

impl Default for Roster {
    fn default() -> Self {
        Self {
            instructors: default_instructors(),
            restrict_to_roster: false,
        }
    }
}

/// Instructors known out of the box.
fn default_instructors() -> Vec<String> {
    vec![
        "Aragon".to_string(),
        "Morrison".to_string(),
        "Howard".to_string(),
    ]
}

impl Roster {
    /// Build a roster from a list of names.
    #[must_use]
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            instructors: names.into_iter().map(Into::into).collect(),
            restrict_to_roster: false,
        }
    }

    /// Check whether `name` is a known instructor.
    ///
    /// Matching is exact, as names are stored verbatim.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.instructors.iter().any(|known| known == name)
    }

    /// Iterate over the known names in display order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.instructors.iter().map(String::as_str)
    }

    /// Number of known instructors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructors.len()
    }

    /// Check if the roster is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructors.is_empty()
    }

    /// Find the first problem with the roster, if any.
    ///
    /// Blank and duplicate names are rejected.
    #[must_use]
    pub fn problem(&self) -> Option<String> {
        for (index, name) in self.instructors.iter().enumerate() {
            if name.trim().is_empty() {
                return Some(format!("roster entry {index} is blank"));
            }
            if self.instructors[..index].contains(name) {
                return Some(format!("instructor '{name}' is listed twice"));
            }
        }
        None
    }
}
