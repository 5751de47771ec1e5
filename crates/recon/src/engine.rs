use crate::catalog::{missing_size_attributes, Catalog};
use crate::classify::classify_sizes;
use crate::error::CheckError;
use crate::model::{CheckSummary, Dataset, Investigation, Level, StoredSizes, Totals};
use crate::report::Reporter;
use crate::selector::InvestigationSelector;

/// Options of one checker pass.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Write observed values back where they differ.
    pub fix: bool,
    /// Restrict the pass to matching investigations.
    pub selector: Option<InvestigationSelector>,
}

/// Verify `fileCount`/`fileSize` of every Dataset and Investigation.
///
/// Fails before touching any record if the schema lacks the attributes.
/// Mismatches never stop the pass; any catalog error aborts it.
pub fn run<C, R>(catalog: &C, reporter: &mut R, opts: &CheckOptions) -> Result<CheckSummary, CheckError<C::Error>>
where
    C: Catalog + ?Sized,
    R: Reporter + ?Sized,
{
    let missing = missing_size_attributes(catalog).map_err(CheckError::Catalog)?;
    if !missing.is_empty() {
        return Err(CheckError::Unsupported { missing });
    }

    let mut summary = CheckSummary::default();
    for investigation in catalog.investigations(opts.selector.as_ref()) {
        let investigation = investigation.map_err(CheckError::Catalog)?;
        check_investigation(catalog, reporter, &investigation, opts.fix, &mut summary)?;
    }

    if let Some(ref sel) = opts.selector {
        if summary.investigations == 0 {
            return Err(CheckError::NoSuchInvestigation(sel.to_string()));
        }
    }
    Ok(summary)
}

/// Check all datasets of one investigation, then the investigation itself
/// against the sum of their observations. Returns that sum.
pub fn check_investigation<C, R>(
    catalog: &C,
    reporter: &mut R,
    investigation: &Investigation,
    fix: bool,
    summary: &mut CheckSummary,
) -> Result<Totals, CheckError<C::Error>>
where
    C: Catalog + ?Sized,
    R: Reporter + ?Sized,
{
    let label = investigation.label();
    reporter.visit(Level::Investigation, &label);
    summary.investigations += 1;

    let mut observed = Totals::default();
    for dataset in catalog.datasets(investigation) {
        let dataset = dataset.map_err(CheckError::Catalog)?;
        let totals = check_dataset(catalog, reporter, investigation, &dataset, fix, summary)?;
        observed = observed
            .checked_add(totals)
            .ok_or_else(|| CheckError::Overflow(label.clone()))?;
    }
    if observed.is_empty() {
        reporter.empty(Level::Investigation, &label);
    }

    reconcile(
        catalog,
        reporter,
        Level::Investigation,
        investigation.id,
        &label,
        &investigation.stored,
        observed,
        fix,
        summary,
    )?;
    Ok(observed)
}

/// Recount one dataset's datafiles and compare. Returns the observation.
pub fn check_dataset<C, R>(
    catalog: &C,
    reporter: &mut R,
    investigation: &Investigation,
    dataset: &Dataset,
    fix: bool,
    summary: &mut CheckSummary,
) -> Result<Totals, CheckError<C::Error>>
where
    C: Catalog + ?Sized,
    R: Reporter + ?Sized,
{
    let label = dataset.label(investigation);
    reporter.visit(Level::Dataset, &label);
    summary.datasets += 1;

    let file_count = catalog.count_datafiles(dataset).map_err(CheckError::Catalog)?;
    let observed = if file_count == 0 {
        reporter.empty(Level::Dataset, &label);
        Totals::default()
    } else {
        let file_size = catalog.sum_datafile_sizes(dataset).map_err(CheckError::Catalog)?;
        Totals::new(file_count, file_size)
    };

    reconcile(catalog, reporter, Level::Dataset, dataset.id, &label, &dataset.stored, observed, fix, summary)?;
    Ok(observed)
}

#[allow(clippy::too_many_arguments)]
fn reconcile<C, R>(
    catalog: &C,
    reporter: &mut R,
    level: Level,
    id: i64,
    label: &str,
    stored: &StoredSizes,
    observed: Totals,
    fix: bool,
    summary: &mut CheckSummary,
) -> Result<(), CheckError<C::Error>>
where
    C: Catalog + ?Sized,
    R: Reporter + ?Sized,
{
    let findings = classify_sizes(level, id, label, stored, observed);
    for finding in &findings {
        reporter.mismatch(finding);
    }
    summary.mismatches += findings.len();

    if fix && !findings.is_empty() {
        catalog.store_sizes(level, id, observed).map_err(CheckError::Catalog)?;
        reporter.corrected(level, label, observed);
        summary.corrections += 1;
    }
    Ok(())
}
