//! In-memory catalog for checker tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::fmt;

use icatadm_recon::{
    Catalog, Dataset, Investigation, InvestigationSelector, Level, Records, StoredSizes, Totals,
    SIZE_ATTRIBUTES,
};

#[derive(Debug)]
pub struct MemError(pub String);

impl fmt::Display for MemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "memory catalog: {}", self.0)
    }
}

impl std::error::Error for MemError {}

#[derive(Debug, Clone)]
pub struct MemDatafile {
    pub dataset: i64,
    pub size: Option<i64>,
}

#[derive(Default)]
pub struct MemoryCatalog {
    pub investigations: RefCell<Vec<Investigation>>,
    /// (investigation id, dataset)
    pub datasets: RefCell<Vec<(i64, Dataset)>>,
    pub datafiles: Vec<MemDatafile>,
    pub attributes: BTreeSet<(String, String)>,
    pub updates: RefCell<Vec<(Level, i64, Totals)>>,
    pub datafile_queries: Cell<usize>,
    /// Fail `count_datafiles` for this dataset id.
    pub fail_on_dataset: Option<i64>,
    next_id: Cell<i64>,
}

impl MemoryCatalog {
    /// A catalog whose schema has all size attributes.
    pub fn new() -> Self {
        let mut c = Self::default();
        c.attributes = SIZE_ATTRIBUTES
            .iter()
            .map(|(e, a)| (e.to_string(), a.to_string()))
            .collect();
        c.next_id.set(1);
        c
    }

    /// A catalog whose schema has none of the size attributes.
    pub fn legacy() -> Self {
        let c = Self::default();
        c.next_id.set(1);
        c
    }

    fn id(&self) -> i64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    pub fn add_investigation(&self, name: &str, visit_id: &str, stored: StoredSizes) -> i64 {
        let id = self.id();
        self.investigations.borrow_mut().push(Investigation {
            id,
            name: name.into(),
            visit_id: visit_id.into(),
            stored,
        });
        id
    }

    pub fn add_dataset(&self, investigation: i64, name: &str, stored: StoredSizes) -> i64 {
        let id = self.id();
        self.datasets.borrow_mut().push((
            investigation,
            Dataset { id, name: name.into(), stored },
        ));
        id
    }

    pub fn add_datafiles(&mut self, dataset: i64, sizes: &[i64]) {
        let sizes: Vec<Option<i64>> = sizes.iter().copied().map(Some).collect();
        self.add_datafiles_opt(dataset, &sizes);
    }

    /// Datafiles whose size may be null.
    pub fn add_datafiles_opt(&mut self, dataset: i64, sizes: &[Option<i64>]) {
        for &size in sizes {
            self.datafiles.push(MemDatafile { dataset, size });
        }
    }

    pub fn stored(&self, level: Level, id: i64) -> StoredSizes {
        match level {
            Level::Investigation => self.investigations.borrow().iter().find(|i| i.id == id).unwrap().stored,
            Level::Dataset => self.datasets.borrow().iter().find(|(_, d)| d.id == id).unwrap().1.stored,
        }
    }
}

impl Catalog for MemoryCatalog {
    type Error = MemError;

    fn has_attribute(&self, entity: &str, attribute: &str) -> Result<bool, MemError> {
        Ok(self.attributes.contains(&(entity.to_string(), attribute.to_string())))
    }

    fn investigations<'a>(
        &'a self,
        selector: Option<&InvestigationSelector>,
    ) -> Records<'a, Investigation, MemError> {
        let selector = selector.cloned();
        let list: Vec<Investigation> = self
            .investigations
            .borrow()
            .iter()
            .filter(|i| match &selector {
                Some(sel) => {
                    i.name == sel.name
                        && sel.visit_id.as_ref().map_or(true, |v| *v == i.visit_id)
                }
                None => true,
            })
            .cloned()
            .collect();
        Box::new(list.into_iter().map(Ok))
    }

    fn datasets<'a>(&'a self, investigation: &Investigation) -> Records<'a, Dataset, MemError> {
        let inv = investigation.id;
        let list: Vec<Dataset> = self
            .datasets
            .borrow()
            .iter()
            .filter(|(i, _)| *i == inv)
            .map(|(_, d)| d.clone())
            .collect();
        Box::new(list.into_iter().map(Ok))
    }

    fn count_datafiles(&self, dataset: &Dataset) -> Result<i64, MemError> {
        if self.fail_on_dataset == Some(dataset.id) {
            return Err(MemError(format!("count failed for dataset {}", dataset.id)));
        }
        self.datafile_queries.set(self.datafile_queries.get() + 1);
        Ok(self.datafiles.iter().filter(|f| f.dataset == dataset.id).count() as i64)
    }

    fn sum_datafile_sizes(&self, dataset: &Dataset) -> Result<i64, MemError> {
        self.datafile_queries.set(self.datafile_queries.get() + 1);
        Ok(self
            .datafiles
            .iter()
            .filter(|f| f.dataset == dataset.id)
            .filter_map(|f| f.size)
            .sum())
    }

    fn store_sizes(&self, level: Level, id: i64, totals: Totals) -> Result<(), MemError> {
        self.updates.borrow_mut().push((level, id, totals));
        match level {
            Level::Investigation => {
                let mut invs = self.investigations.borrow_mut();
                let inv = invs.iter_mut().find(|i| i.id == id).ok_or_else(|| MemError(format!("no investigation {id}")))?;
                inv.stored = totals.into();
            }
            Level::Dataset => {
                let mut dss = self.datasets.borrow_mut();
                let (_, ds) = dss.iter_mut().find(|(_, d)| d.id == id).ok_or_else(|| MemError(format!("no dataset {id}")))?;
                ds.stored = totals.into();
            }
        }
        Ok(())
    }
}
