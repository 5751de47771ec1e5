//! The checker's view of the remote catalog.
//!
//! Implementations live with the transport (the CLI adapts the REST client);
//! tests use an in-memory catalog. Listings are lazy iterators so that an
//! implementation can page through large collections.

use crate::model::{Dataset, Investigation, Level, Totals};
use crate::selector::InvestigationSelector;

/// Boxed lazy listing of catalog records.
pub type Records<'a, T, E> = Box<dyn Iterator<Item = Result<T, E>> + 'a>;

/// Aggregate attributes the checker reads and writes, as (entity, attribute).
pub const SIZE_ATTRIBUTES: [(&str, &str); 4] = [
    ("Investigation", "fileSize"),
    ("Investigation", "fileCount"),
    ("Dataset", "fileSize"),
    ("Dataset", "fileCount"),
];

pub trait Catalog {
    type Error: std::error::Error + 'static;

    /// Whether the server schema exposes `entity.attribute`.
    fn has_attribute(&self, entity: &str, attribute: &str) -> Result<bool, Self::Error>;

    /// All investigations, or those matching `selector`.
    fn investigations<'a>(
        &'a self,
        selector: Option<&InvestigationSelector>,
    ) -> Records<'a, Investigation, Self::Error>;

    /// Datasets belonging to `investigation`.
    fn datasets<'a>(&'a self, investigation: &Investigation) -> Records<'a, Dataset, Self::Error>;

    /// Number of datafiles in `dataset`.
    fn count_datafiles(&self, dataset: &Dataset) -> Result<i64, Self::Error>;

    /// Sum of datafile sizes in `dataset`; nulls count as zero.
    fn sum_datafile_sizes(&self, dataset: &Dataset) -> Result<i64, Self::Error>;

    /// Overwrite both aggregate attributes of one record.
    fn store_sizes(&self, level: Level, id: i64, totals: Totals) -> Result<(), Self::Error>;
}

/// Probe the schema for every entry of [`SIZE_ATTRIBUTES`]; returns the
/// missing ones as `Entity.attribute`.
pub fn missing_size_attributes<C: Catalog + ?Sized>(catalog: &C) -> Result<Vec<String>, C::Error> {
    let mut missing = Vec::new();
    for (entity, attribute) in SIZE_ATTRIBUTES {
        if !catalog.has_attribute(entity, attribute)? {
            missing.push(format!("{entity}.{attribute}"));
        }
    }
    Ok(missing)
}
