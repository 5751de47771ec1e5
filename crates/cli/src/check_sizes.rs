// check-sizes: recompute fileCount/fileSize of Datasets and Investigations
// and report (or, with --fix-values, correct) the stored values.

use icatadm_client::IcatClient;
use icatadm_recon::{run, CheckOptions, CheckSummary, InvestigationSelector, LogReporter, Reporter};
use tracing::info;

use crate::catalog::IcatCatalog;
use crate::CliError;

pub fn cmd_check_sizes(
    client: &IcatClient,
    fix: bool,
    investigation: Option<InvestigationSelector>,
) -> Result<(), CliError> {
    let version = client.version().map_err(CliError::icat)?;
    info!("Connected to {} (icat.server {version})", client.base_url());

    let summary = check_sizes(client, &mut LogReporter, fix, investigation)?;
    info!("{summary}");
    Ok(())
}

/// One full pass with an arbitrary reporter.
pub fn check_sizes<R: Reporter>(
    client: &IcatClient,
    reporter: &mut R,
    fix: bool,
    selector: Option<InvestigationSelector>,
) -> Result<CheckSummary, CliError> {
    let catalog = IcatCatalog::new(client);
    let opts = CheckOptions { fix, selector };
    run(&catalog, reporter, &opts).map_err(CliError::check)
}
