// ICAT connection settings
// Loaded from ~/.config/icatadm/config.toml, one table per named section:
//
//   [section.default]
//   url = "https://icat.example.org:8181"
//   auth = "simple"
//   username = "root"
//   password = "secret"

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Section used when none is named on the command line.
pub const DEFAULT_SECTION: &str = "default";

/// Default authenticator plugin.
pub const DEFAULT_AUTH: &str = "simple";

/// Default search page size.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Authenticators that take no credentials.
const ANONYMOUS_AUTH: &[&str] = &["anon"];

#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    Io { path: PathBuf, message: String },
    /// Config file is not valid TOML for this schema.
    Parse { path: PathBuf, message: String },
    /// A section was requested that the file does not define.
    MissingSection { path: PathBuf, section: String },
    /// A required setting has no value from any source.
    Missing(&'static str),
    /// A setting has an unusable value.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, message } => write!(f, "cannot read {}: {message}", path.display()),
            Self::Parse { path, message } => write!(f, "invalid config {}: {message}", path.display()),
            Self::MissingSection { path, section } => {
                write!(f, "{}: no section [section.{section}]", path.display())
            }
            Self::Missing(key) => write!(f, "missing configuration: {key}"),
            Self::Invalid(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// One section of the config file. Every key is optional; the same shape
/// carries command-line and environment overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SectionConfig {
    /// ICAT service URL
    pub url: Option<String>,
    /// IDS service URL
    pub ids_url: Option<String>,
    /// Authenticator plugin name
    pub auth: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Objects per search page
    pub chunk_size: Option<usize>,
    /// Verify TLS certificates
    pub check_cert: Option<bool>,
}

impl SectionConfig {
    /// Fill every unset key from `lower`.
    pub fn or(self, lower: &SectionConfig) -> SectionConfig {
        SectionConfig {
            url: self.url.or_else(|| lower.url.clone()),
            ids_url: self.ids_url.or_else(|| lower.ids_url.clone()),
            auth: self.auth.or_else(|| lower.auth.clone()),
            username: self.username.or_else(|| lower.username.clone()),
            password: self.password.or_else(|| lower.password.clone()),
            chunk_size: self.chunk_size.or(lower.chunk_size),
            check_cert: self.check_cert.or(lower.check_cert),
        }
    }
}

/// Parsed config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub section: BTreeMap<String, SectionConfig>,
}

impl ConfigFile {
    /// Default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("icatadm")
            .join("config.toml")
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(path, &contents)
    }

    pub fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// What the command line asked for.
#[derive(Debug, Clone, Default)]
pub struct ConfigRequest {
    /// Explicit config file; must exist when given.
    pub file: Option<PathBuf>,
    /// Explicit section; must exist when given.
    pub section: Option<String>,
    /// Command-line and environment values, highest precedence.
    pub overrides: SectionConfig,
}

/// Fully resolved connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub url: String,
    pub ids_url: Option<String>,
    pub auth: String,
    /// Ordered credential key/value pairs handed to the authenticator.
    pub credentials: Vec<(String, String)>,
    pub chunk_size: usize,
    pub check_cert: bool,
}

impl ConnectionConfig {
    /// The IDS URL, or an error naming the missing setting.
    pub fn require_ids_url(&self) -> Result<&str, ConfigError> {
        self.ids_url.as_deref().ok_or(ConfigError::Missing("ids_url (--idsurl / ICAT_IDS)"))
    }
}

/// Resolve a request: overrides > file section > defaults.
///
/// Without an explicit file the default path is used if it exists.
pub fn load(request: &ConfigRequest) -> Result<ConnectionConfig, ConfigError> {
    let (path, file) = match &request.file {
        Some(p) => (p.clone(), Some(ConfigFile::load(p)?)),
        None => {
            let p = ConfigFile::default_path();
            let file = if p.is_file() { Some(ConfigFile::load(&p)?) } else { None };
            (p, file)
        }
    };

    let section_name = request.section.as_deref().unwrap_or(DEFAULT_SECTION);
    let section = match file.as_ref().and_then(|f| f.section.get(section_name)) {
        Some(s) => s.clone(),
        None if request.section.is_some() => {
            return Err(ConfigError::MissingSection {
                path,
                section: section_name.to_string(),
            });
        }
        None => SectionConfig::default(),
    };

    resolve(request.overrides.clone().or(&section))
}

/// Apply defaults and validate a merged section.
pub fn resolve(merged: SectionConfig) -> Result<ConnectionConfig, ConfigError> {
    let url = merged.url.ok_or(ConfigError::Missing("url (--url / ICAT_SERVICE)"))?;
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::Invalid(format!("url must be http(s): {url}")));
    }

    let auth = merged.auth.unwrap_or_else(|| DEFAULT_AUTH.to_string());
    let credentials = if ANONYMOUS_AUTH.contains(&auth.as_str()) {
        Vec::new()
    } else {
        let username = merged.username.ok_or(ConfigError::Missing("username (--user / ICAT_USER)"))?;
        let password = merged.password.ok_or(ConfigError::Missing("password (--pass / ICAT_PASS)"))?;
        vec![("username".to_string(), username), ("password".to_string(), password)]
    };

    let chunk_size = merged.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
    if chunk_size == 0 {
        return Err(ConfigError::Invalid("chunk_size must be positive".into()));
    }

    Ok(ConnectionConfig {
        url,
        ids_url: merged.ids_url,
        auth,
        credentials,
        chunk_size,
        check_cert: merged.check_cert.unwrap_or(true),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[section.default]
url = "https://icat.example.org:8181"
username = "reader"
password = "pw"

[section.admin]
url = "https://icat.example.org:8181"
ids_url = "https://ids.example.org:8181"
auth = "db"
username = "root"
password = "secret"
chunk_size = 500
check_cert = false
"#;

    fn write_sample() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, SAMPLE).unwrap();
        (dir, path)
    }

    #[test]
    fn default_section_with_defaults() {
        let (_dir, path) = write_sample();
        let cfg = load(&ConfigRequest { file: Some(path), ..Default::default() }).unwrap();
        assert_eq!(cfg.url, "https://icat.example.org:8181");
        assert_eq!(cfg.auth, "simple");
        assert_eq!(cfg.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(cfg.check_cert);
        assert!(cfg.ids_url.is_none());
        assert_eq!(
            cfg.credentials,
            vec![("username".into(), "reader".into()), ("password".into(), "pw".into())]
        );
    }

    #[test]
    fn named_section() {
        let (_dir, path) = write_sample();
        let cfg = load(&ConfigRequest {
            file: Some(path),
            section: Some("admin".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(cfg.auth, "db");
        assert_eq!(cfg.chunk_size, 500);
        assert!(!cfg.check_cert);
        assert_eq!(cfg.require_ids_url().unwrap(), "https://ids.example.org:8181");
    }

    #[test]
    fn overrides_win_over_file() {
        let (_dir, path) = write_sample();
        let cfg = load(&ConfigRequest {
            file: Some(path),
            section: Some("admin".into()),
            overrides: SectionConfig {
                username: Some("alice".into()),
                chunk_size: Some(10),
                ..Default::default()
            },
        })
        .unwrap();
        assert_eq!(cfg.credentials[0], ("username".into(), "alice".into()));
        assert_eq!(cfg.credentials[1], ("password".into(), "secret".into()));
        assert_eq!(cfg.chunk_size, 10);
    }

    #[test]
    fn explicit_missing_section_is_an_error() {
        let (_dir, path) = write_sample();
        let err = load(&ConfigRequest {
            file: Some(path),
            section: Some("nope".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingSection { ref section, .. } if section == "nope"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = load(&ConfigRequest {
            file: Some(PathBuf::from("/nonexistent/icatadm.toml")),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ConfigFile::parse(Path::new("x.toml"), "[section.default]\nurll = \"x\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn resolve_requires_url_and_credentials() {
        let err = resolve(SectionConfig::default()).unwrap_err();
        assert!(err.to_string().contains("url"));

        let err = resolve(SectionConfig {
            url: Some("https://icat".into()),
            username: Some("u".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("password"));
    }

    #[test]
    fn anonymous_needs_no_credentials() {
        let cfg = resolve(SectionConfig {
            url: Some("https://icat".into()),
            auth: Some("anon".into()),
            ..Default::default()
        })
        .unwrap();
        assert!(cfg.credentials.is_empty());
    }

    #[test]
    fn rejects_bad_values() {
        let err = resolve(SectionConfig { url: Some("icat.example.org".into()), ..Default::default() }).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = resolve(SectionConfig {
            url: Some("https://icat".into()),
            auth: Some("anon".into()),
            chunk_size: Some(0),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn default_path_is_under_config_dir() {
        let path = ConfigFile::default_path();
        assert!(path.ends_with("icatadm/config.toml"));
    }
}
