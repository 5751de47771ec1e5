//! `Catalog` over a live ICAT server.
//!
//! Listings page through `search_chunked`; counts and sums are server-side
//! aggregates over the Datafiles of one Dataset.

use icatadm_client::{unwrap_entity, Aggregate, IcatClient, IcatError, Query};
use icatadm_recon::{
    Catalog, Dataset, Investigation, InvestigationSelector, Level, Records, SizeField, StoredSizes,
    Totals,
};
use serde_json::{Map, Value};

pub struct IcatCatalog<'c> {
    client: &'c IcatClient,
}

impl<'c> IcatCatalog<'c> {
    /// The client must be logged in.
    pub fn new(client: &'c IcatClient) -> Self {
        Self { client }
    }
}

impl Catalog for IcatCatalog<'_> {
    type Error = IcatError;

    fn has_attribute(&self, entity: &str, attribute: &str) -> Result<bool, IcatError> {
        self.client.probe_attribute(entity, attribute)
    }

    fn investigations<'a>(
        &'a self,
        selector: Option<&InvestigationSelector>,
    ) -> Records<'a, Investigation, IcatError> {
        let mut query = Query::new("Investigation");
        if let Some(sel) = selector {
            query = query.where_eq("name", sel.name.as_str());
            if let Some(ref visit) = sel.visit_id {
                query = query.where_eq("visitId", visit.as_str());
            }
        }
        let rows = self.client.search_chunked(&query);
        Box::new(rows.map(|row| row.and_then(|v| decode_investigation(&v))))
    }

    fn datasets<'a>(&'a self, investigation: &Investigation) -> Records<'a, Dataset, IcatError> {
        let query = Query::new("Dataset").where_eq("investigation.id", investigation.id);
        let rows = self.client.search_chunked(&query);
        Box::new(rows.map(|row| row.and_then(|v| decode_dataset(&v))))
    }

    fn count_datafiles(&self, dataset: &Dataset) -> Result<i64, IcatError> {
        let query = Query::new("Datafile")
            .aggregate(Aggregate::Count)
            .where_eq("dataset.id", dataset.id);
        Ok(self.client.aggregate(&query)?.unwrap_or(0))
    }

    fn sum_datafile_sizes(&self, dataset: &Dataset) -> Result<i64, IcatError> {
        let query = Query::new("Datafile")
            .attribute("fileSize")
            .aggregate(Aggregate::Sum)
            .where_eq("dataset.id", dataset.id);
        Ok(self.client.aggregate(&query)?.unwrap_or(0))
    }

    fn store_sizes(&self, level: Level, id: i64, totals: Totals) -> Result<(), IcatError> {
        let mut fields = Map::new();
        for field in SizeField::ALL {
            fields.insert(field.attribute().into(), Value::from(totals.get(field)));
        }
        self.client.update(level.entity(), id, fields)
    }
}

// ── Decoding ────────────────────────────────────────────────────────

fn decode_investigation(value: &Value) -> Result<Investigation, IcatError> {
    let obj = unwrap_entity(value, "Investigation")?;
    Ok(Investigation {
        id: required_id(obj, "Investigation")?,
        name: required_str(obj, "Investigation", "name")?,
        visit_id: required_str(obj, "Investigation", "visitId")?,
        stored: stored_sizes(obj),
    })
}

fn decode_dataset(value: &Value) -> Result<Dataset, IcatError> {
    let obj = unwrap_entity(value, "Dataset")?;
    Ok(Dataset {
        id: required_id(obj, "Dataset")?,
        name: required_str(obj, "Dataset", "name")?,
        stored: stored_sizes(obj),
    })
}

/// Absent and `null` both mean "not set".
fn stored_sizes(obj: &Map<String, Value>) -> StoredSizes {
    let get = |field: SizeField| obj.get(field.attribute()).and_then(Value::as_i64);
    StoredSizes::new(get(SizeField::FileCount), get(SizeField::FileSize))
}

fn required_id(obj: &Map<String, Value>, entity: &str) -> Result<i64, IcatError> {
    obj.get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| IcatError::Parse(format!("{entity} without id")))
}

fn required_str(obj: &Map<String, Value>, entity: &str, key: &str) -> Result<String, IcatError> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| IcatError::Parse(format!("{entity} without {key}")))
}
