use std::fmt;

use crate::model::{Level, SizeField, StoredSizes, Totals};

/// How a stored aggregate disagrees with the observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldStatus {
    /// Stored value is null on an entity that has datafiles.
    NotSet,
    Wrong { stored: i64, observed: i64 },
}

/// Classify one field; `None` means it matches. Exact integer equality, no
/// tolerance.
///
/// A null is acceptable only when the entity has no datafiles at all
/// (`empty`). Once there is a datafile, a null is "not set" even if the
/// observed value of this field is zero.
pub fn classify_field(stored: Option<i64>, observed: i64, empty: bool) -> Option<FieldStatus> {
    match stored {
        None if empty => None,
        None => Some(FieldStatus::NotSet),
        Some(s) if s == observed => None,
        Some(s) => Some(FieldStatus::Wrong { stored: s, observed }),
    }
}

/// A single reported discrepancy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub level: Level,
    pub id: i64,
    pub label: String,
    pub field: SizeField,
    pub status: FieldStatus,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            FieldStatus::NotSet => write!(f, "{}: {} is not set", self.label, self.field),
            FieldStatus::Wrong { stored, observed } => write!(
                f,
                "{}: {} is wrong: {} versus {}",
                self.label, self.field, stored, observed
            ),
        }
    }
}

/// Compare both aggregate fields of one record; returns only the mismatches,
/// in `fileCount`, `fileSize` order.
pub fn classify_sizes(
    level: Level,
    id: i64,
    label: &str,
    stored: &StoredSizes,
    observed: Totals,
) -> Vec<Finding> {
    let empty = observed.is_empty();
    SizeField::ALL
        .iter()
        .filter_map(|&field| {
            classify_field(stored.get(field), observed.get(field), empty).map(|status| Finding {
                level,
                id,
                label: label.to_string(),
                field,
                status,
            })
        })
        .collect()
}
