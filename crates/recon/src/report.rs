//! Where checker output goes.
//!
//! The checker never logs directly; it is handed a `Reporter`. `LogReporter`
//! forwards to `tracing`, `Findings` collects everything in memory.

use tracing::{debug, info, warn};

use crate::classify::Finding;
use crate::model::{Level, Totals};

pub trait Reporter {
    /// An entity is about to be checked.
    fn visit(&mut self, level: Level, label: &str);

    /// The entity has no datafiles below it.
    fn empty(&mut self, level: Level, label: &str);

    fn mismatch(&mut self, finding: &Finding);

    /// Corrected values were written back.
    fn corrected(&mut self, level: Level, label: &str, totals: Totals);
}

impl<R: Reporter + ?Sized> Reporter for &mut R {
    fn visit(&mut self, level: Level, label: &str) {
        (**self).visit(level, label)
    }

    fn empty(&mut self, level: Level, label: &str) {
        (**self).empty(level, label)
    }

    fn mismatch(&mut self, finding: &Finding) {
        (**self).mismatch(finding)
    }

    fn corrected(&mut self, level: Level, label: &str, totals: Totals) {
        (**self).corrected(level, label, totals)
    }
}

/// Mismatches at WARN, corrections at INFO, visits at DEBUG.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn visit(&mut self, level: Level, label: &str) {
        match level {
            Level::Investigation => debug!("Check sizes in {label}"),
            Level::Dataset => debug!("Considering {label}"),
        }
    }

    fn empty(&mut self, _level: Level, label: &str) {
        debug!("{label} has no datafiles");
    }

    fn mismatch(&mut self, finding: &Finding) {
        warn!("{finding}");
    }

    fn corrected(&mut self, _level: Level, label: &str, totals: Totals) {
        info!(
            "{label}: set fileCount = {}, fileSize = {}",
            totals.file_count, totals.file_size
        );
    }
}

/// In-memory record of everything reported.
#[derive(Debug, Default, Clone)]
pub struct Findings {
    pub visited: Vec<(Level, String)>,
    pub empty: Vec<(Level, String)>,
    pub mismatches: Vec<Finding>,
    pub corrections: Vec<(Level, String, Totals)>,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mismatch messages, in report order.
    pub fn messages(&self) -> Vec<String> {
        self.mismatches.iter().map(|f| f.to_string()).collect()
    }
}

impl Reporter for Findings {
    fn visit(&mut self, level: Level, label: &str) {
        self.visited.push((level, label.to_string()));
    }

    fn empty(&mut self, level: Level, label: &str) {
        self.empty.push((level, label.to_string()));
    }

    fn mismatch(&mut self, finding: &Finding) {
        self.mismatches.push(finding.clone());
    }

    fn corrected(&mut self, level: Level, label: &str, totals: Totals) {
        self.corrections.push((level, label.to_string(), totals));
    }
}
