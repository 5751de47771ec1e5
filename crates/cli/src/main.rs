// icatadm - administration tools for ICAT
//
//   icatadm [connection options] check-sizes [--fix-values] [INVESTIGATION]
//   icatadm [connection options] ids-bug164 --investigation NAME

mod bug164;
mod catalog;
mod check_sizes;
mod exit_codes;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use icatadm_client::{ClientOptions, IcatClient, IcatError, IdsClient};
use icatadm_config::{ConfigError, ConfigRequest, ConnectionConfig, SectionConfig};
use icatadm_recon::{CheckError, InvestigationSelector};
use tracing::{debug, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use exit_codes::{
    EXIT_CHECK_UNSUPPORTED, EXIT_CONFIG, EXIT_ERROR, EXIT_ICAT_AUTH, EXIT_ICAT_NETWORK,
    EXIT_ICAT_SERVER, EXIT_SUCCESS, EXIT_USAGE,
};

/// Uploads through the slow reader outlast the default request timeout.
const IDS_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Parser)]
#[command(name = "icatadm")]
#[command(about = "Administration tools for ICAT")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(flatten)]
    conn: ConnectionArgs,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct ConnectionArgs {
    /// Configuration file [default: <config dir>/icatadm/config.toml]
    #[arg(short = 'c', long = "configfile", value_name = "FILE")]
    configfile: Option<PathBuf>,

    /// Section of the configuration file [default: default]
    #[arg(short = 's', long = "configsection", value_name = "SECTION")]
    configsection: Option<String>,

    /// URL of the ICAT service
    #[arg(short = 'w', long = "url", env = "ICAT_SERVICE")]
    url: Option<String>,

    /// URL of the IDS service
    #[arg(long = "idsurl", env = "ICAT_IDS")]
    ids_url: Option<String>,

    /// Authentication plugin
    #[arg(short = 'a', long = "auth", env = "ICAT_AUTH")]
    auth: Option<String>,

    /// User name
    #[arg(short = 'u', long = "user", env = "ICAT_USER")]
    user: Option<String>,

    /// Password
    #[arg(short = 'p', long = "pass", env = "ICAT_PASS", hide_env_values = true)]
    pass: Option<String>,

    /// Objects fetched per search request
    #[arg(long = "chunk-size", value_name = "N")]
    chunk_size: Option<usize>,

    /// Do not verify the server TLS certificate
    #[arg(long = "no-check-certificate")]
    no_check_certificate: bool,
}

impl ConnectionArgs {
    fn request(&self) -> ConfigRequest {
        ConfigRequest {
            file: self.configfile.clone(),
            section: self.configsection.clone(),
            overrides: SectionConfig {
                url: self.url.clone(),
                ids_url: self.ids_url.clone(),
                auth: self.auth.clone(),
                username: self.user.clone(),
                password: self.pass.clone(),
                chunk_size: self.chunk_size,
                check_cert: self.no_check_certificate.then_some(false),
            },
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check fileCount and fileSize of Datasets and Investigations
    #[command(after_help = "\
Examples:
  icatadm check-sizes
  icatadm -s admin check-sizes --fix-values
  icatadm check-sizes 12100409-ST:1.1-P")]
    CheckSizes {
        /// Write corrected values back to the server
        #[arg(long)]
        fix_values: bool,

        /// Restrict to one investigation: NAME or NAME:VISITID
        investigation: Option<InvestigationSelector>,
    },

    /// Upload test data that triggers ids.server issue 164
    #[command(name = "ids-bug164")]
    IdsBug164 {
        /// Investigation (unique by name) to upload to
        #[arg(long)]
        investigation: String,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\ntarget:  ", env!("TARGET"),
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

/// Plain `LEVEL message` lines on stderr.
fn init_logging(verbose: bool) {
    let default = if verbose {
        "info,icatadm_cli=debug,icatadm_client=debug,icatadm_recon=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .without_time()
                .with_target(false),
        )
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let conf = icatadm_config::load(&cli.conn.request()).map_err(CliError::config)?;
    let opts = client_options(&conf);

    // Resolve everything that can fail locally before opening a session.
    let ids = match &cli.command {
        Commands::IdsBug164 { .. } => {
            let url = conf.require_ids_url().map_err(CliError::config)?;
            let ids_opts = ClientOptions { timeout: IDS_TIMEOUT, ..opts.clone() };
            Some(IdsClient::new(url, &ids_opts).map_err(CliError::icat)?)
        }
        Commands::CheckSizes { .. } => None,
    };

    let mut client = connect(&conf, &opts)?;
    let result = match (cli.command, ids) {
        (Commands::CheckSizes { fix_values, investigation }, _) => {
            check_sizes::cmd_check_sizes(&client, fix_values, investigation)
        }
        (Commands::IdsBug164 { investigation }, Some(ids)) => {
            bug164::cmd_ids_bug164(&client, &ids, &investigation)
        }
        (Commands::IdsBug164 { .. }, None) => Err(CliError::config(ConfigError::Missing("ids_url"))),
    };

    if let Err(e) = client.logout() {
        warn!("logout failed: {e}");
    }
    result
}

fn client_options(conf: &ConnectionConfig) -> ClientOptions {
    ClientOptions {
        check_cert: conf.check_cert,
        chunk_size: conf.chunk_size,
        ..ClientOptions::default()
    }
}

fn connect(conf: &ConnectionConfig, opts: &ClientOptions) -> Result<IcatClient, CliError> {
    let mut client = IcatClient::new(&conf.url, opts).map_err(CliError::icat)?;
    client.login(&conf.auth, &conf.credentials).map_err(CliError::login)?;
    debug!(auth = %conf.auth, "session open on {}", conf.url);
    Ok(client)
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn config(err: ConfigError) -> Self {
        let hint = match &err {
            ConfigError::Missing(_) => {
                Some("pass it on the command line, in the environment, or in the config file".to_string())
            }
            ConfigError::MissingSection { .. } => Some("check --configsection".to_string()),
            _ => None,
        };
        Self { code: EXIT_CONFIG, message: err.to_string(), hint }
    }

    /// Create error from a client error with the matching exit code.
    pub fn icat(err: IcatError) -> Self {
        let (code, hint) = match &err {
            e if e.is_session_error() => {
                (EXIT_ICAT_AUTH, Some("session expired or invalid; log in again".to_string()))
            }
            IcatError::Network(_) => {
                (EXIT_ICAT_NETWORK, Some("check the service URL and --no-check-certificate".to_string()))
            }
            IcatError::Http(..) => (EXIT_ICAT_NETWORK, None),
            IcatError::Server { .. } => (EXIT_ICAT_SERVER, None),
            IcatError::Parse(_) => (EXIT_ERROR, None),
            IcatError::NotLoggedIn => (EXIT_ICAT_AUTH, None),
        };
        Self { code, message: err.to_string(), hint }
    }

    /// Any server-side rejection of the login counts as an auth failure.
    pub fn login(err: IcatError) -> Self {
        match err {
            IcatError::Server { .. } | IcatError::Http(401 | 403, _) => Self {
                code: EXIT_ICAT_AUTH,
                message: format!("login failed: {err}"),
                hint: Some("check --auth, --user and --pass".to_string()),
            },
            other => Self::icat(other),
        }
    }

    pub fn check(err: CheckError<IcatError>) -> Self {
        match err {
            CheckError::Unsupported { .. } => Self {
                code: EXIT_CHECK_UNSUPPORTED,
                message: err.to_string(),
                hint: Some("fileCount and fileSize need icat.server 5.0 or newer".to_string()),
            },
            CheckError::NoSuchInvestigation(_) => Self::usage(err.to_string())
                .with_hint("INVESTIGATION is NAME or NAME:VISITID"),
            CheckError::Overflow(_) => Self { code: EXIT_ERROR, message: err.to_string(), hint: None },
            CheckError::Catalog(e) => Self::icat(e),
        }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_check_sizes() {
        let cli = Cli::try_parse_from([
            "icatadm", "-w", "https://icat:8181", "-u", "root", "-p", "pw",
            "check-sizes", "--fix-values", "inv:1",
        ])
        .unwrap();
        match cli.command {
            Commands::CheckSizes { fix_values, investigation } => {
                assert!(fix_values);
                let sel = investigation.unwrap();
                assert_eq!(sel.name, "inv");
                assert_eq!(sel.visit_id.as_deref(), Some("1"));
            }
            _ => panic!("expected check-sizes"),
        }
        assert_eq!(cli.conn.url.as_deref(), Some("https://icat:8181"));
    }

    #[test]
    fn test_parse_rejects_empty_selector_part() {
        assert!(Cli::try_parse_from(["icatadm", "check-sizes", "inv:"]).is_err());
    }

    #[test]
    fn test_parse_ids_bug164_requires_investigation() {
        assert!(Cli::try_parse_from(["icatadm", "ids-bug164"]).is_err());
        let cli = Cli::try_parse_from(["icatadm", "ids-bug164", "--investigation", "x"]).unwrap();
        assert!(matches!(cli.command, Commands::IdsBug164 { ref investigation } if investigation == "x"));
    }

    #[test]
    fn test_connection_args_to_overrides() {
        let args = ConnectionArgs {
            user: Some("alice".into()),
            chunk_size: Some(5),
            no_check_certificate: true,
            ..Default::default()
        };
        let req = args.request();
        assert_eq!(req.overrides.username.as_deref(), Some("alice"));
        assert_eq!(req.overrides.chunk_size, Some(5));
        assert_eq!(req.overrides.check_cert, Some(false));
        assert!(req.overrides.url.is_none());

        let args = ConnectionArgs::default();
        assert_eq!(args.request().overrides.check_cert, None);
    }

    #[test]
    fn test_config_file_feeds_client_options() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[section.test]\nurl = \"https://icat:8181\"\nauth = \"anon\"\nchunk_size = 7\ncheck_cert = false\n",
        )
        .unwrap();
        let args = ConnectionArgs {
            configfile: Some(path),
            configsection: Some("test".into()),
            ..Default::default()
        };
        let conf = icatadm_config::load(&args.request()).unwrap();
        let opts = client_options(&conf);
        assert_eq!(opts.chunk_size, 7);
        assert!(!opts.check_cert);
    }

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(CliError::icat(IcatError::Network("refused".into())).code, EXIT_ICAT_NETWORK);
        assert_eq!(CliError::icat(IcatError::NotLoggedIn).code, EXIT_ICAT_AUTH);
        let session = IcatError::Server { status: 403, code: "SESSION".into(), message: "expired".into() };
        assert_eq!(CliError::icat(session).code, EXIT_ICAT_AUTH);
        let internal = IcatError::Server { status: 500, code: "INTERNAL".into(), message: "x".into() };
        assert_eq!(CliError::icat(internal).code, EXIT_ICAT_SERVER);

        let rejected = IcatError::Server { status: 403, code: "INSUFFICIENT_PRIVILEGES".into(), message: "no".into() };
        let err = CliError::login(rejected);
        assert_eq!(err.code, EXIT_ICAT_AUTH);
        assert!(err.message.starts_with("login failed"));

        let err = CliError::check(CheckError::Unsupported { missing: vec!["Dataset.fileSize".into()] });
        assert_eq!(err.code, EXIT_CHECK_UNSUPPORTED);
        let err = CliError::check(CheckError::Overflow("Investigation(I / 1)".into()));
        assert_eq!(err.code, EXIT_ERROR);
        assert!(err.message.contains("overflow"));
        assert_eq!(CliError::config(ConfigError::Missing("url")).code, EXIT_CONFIG);
    }

    #[test]
    fn test_login_against_mock() {
        use httpmock::prelude::*;

        let server = httpmock::MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/icat/session");
            then.status(403).json_body(serde_json::json!({
                "code": "SESSION",
                "message": "The username and password do not match"
            }));
        });
        let conf = icatadm_config::resolve(SectionConfig {
            url: Some(server.base_url()),
            username: Some("root".into()),
            password: Some("bad".into()),
            ..Default::default()
        })
        .unwrap();
        let err = connect(&conf, &client_options(&conf)).err().unwrap();
        assert_eq!(err.code, EXIT_ICAT_AUTH);
    }
}
