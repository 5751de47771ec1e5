use std::fmt;

// ---------------------------------------------------------------------------
// Catalog records
// ---------------------------------------------------------------------------

/// Denormalized aggregate values as stored on a parent record.
/// `None` means the attribute is null on the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoredSizes {
    pub file_count: Option<i64>,
    pub file_size: Option<i64>,
}

impl StoredSizes {
    pub fn new(file_count: Option<i64>, file_size: Option<i64>) -> Self {
        Self { file_count, file_size }
    }

    pub fn get(&self, field: SizeField) -> Option<i64> {
        match field {
            SizeField::FileCount => self.file_count,
            SizeField::FileSize => self.file_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Investigation {
    pub id: i64,
    pub name: String,
    pub visit_id: String,
    pub stored: StoredSizes,
}

impl Investigation {
    /// `Investigation(<name> / <visitId>)`
    pub fn label(&self) -> String {
        format!("Investigation({} / {})", self.name, self.visit_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    pub id: i64,
    pub name: String,
    pub stored: StoredSizes,
}

impl Dataset {
    /// `Dataset(<inv name> / <inv visitId> / <name>)`
    pub fn label(&self, investigation: &Investigation) -> String {
        format!(
            "Dataset({} / {} / {})",
            investigation.name, investigation.visit_id, self.name
        )
    }
}

// ---------------------------------------------------------------------------
// Aggregate attributes
// ---------------------------------------------------------------------------

/// Which level of the hierarchy carries the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Level {
    Investigation,
    Dataset,
}

impl Level {
    /// ICAT entity name.
    pub fn entity(&self) -> &'static str {
        match self {
            Self::Investigation => "Investigation",
            Self::Dataset => "Dataset",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entity())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SizeField {
    FileCount,
    FileSize,
}

impl SizeField {
    pub const ALL: [SizeField; 2] = [SizeField::FileCount, SizeField::FileSize];

    /// ICAT attribute name.
    pub fn attribute(&self) -> &'static str {
        match self {
            Self::FileCount => "fileCount",
            Self::FileSize => "fileSize",
        }
    }
}

impl fmt::Display for SizeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attribute())
    }
}

/// Observed count and size, recomputed from the leaves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub file_count: i64,
    pub file_size: i64,
}

impl Totals {
    pub fn new(file_count: i64, file_size: i64) -> Self {
        Self { file_count, file_size }
    }

    pub fn get(&self, field: SizeField) -> i64 {
        match field {
            SizeField::FileCount => self.file_count,
            SizeField::FileSize => self.file_size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.file_count == 0
    }

    /// Field-wise sum, `None` if either field overflows `i64`.
    pub fn checked_add(self, rhs: Totals) -> Option<Totals> {
        Some(Totals {
            file_count: self.file_count.checked_add(rhs.file_count)?,
            file_size: self.file_size.checked_add(rhs.file_size)?,
        })
    }
}

/// Overflow behaves as for `i64` addition; use [`Totals::checked_add`] on
/// values read from a catalog.
impl std::ops::Add for Totals {
    type Output = Totals;

    fn add(self, rhs: Totals) -> Totals {
        Totals {
            file_count: self.file_count + rhs.file_count,
            file_size: self.file_size + rhs.file_size,
        }
    }
}

impl std::ops::AddAssign for Totals {
    fn add_assign(&mut self, rhs: Totals) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for Totals {
    fn sum<I: Iterator<Item = Totals>>(iter: I) -> Totals {
        iter.fold(Totals::default(), |acc, t| acc + t)
    }
}

impl From<Totals> for StoredSizes {
    fn from(t: Totals) -> Self {
        StoredSizes::new(Some(t.file_count), Some(t.file_size))
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Counters of one checker pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckSummary {
    pub investigations: usize,
    pub datasets: usize,
    pub mismatches: usize,
    pub corrections: usize,
}

impl fmt::Display for CheckSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "checked {} investigation(s), {} dataset(s): {} mismatch(es), {} correction(s)",
            self.investigations, self.datasets, self.mismatches, self.corrections
        )
    }
}
