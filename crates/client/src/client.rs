//! ICAT REST client.
//!
//! Blocking reqwest client (no Tokio runtime required). One client holds at
//! most one session. Endpoints used:
//!
//! - `POST   /icat/session`          login
//! - `DELETE /icat/session/{id}`     logout
//! - `GET    /icat/version`          server version
//! - `GET    /icat/entityManager`    search
//! - `POST   /icat/entityManager`    create / update

use std::time::Duration;

use serde_json::{Map, Value};
use tracing::debug;

use crate::cursor::Chunked;
use crate::query::Query;

/// Default number of objects fetched per page by [`IcatClient::search_chunked`].
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Error type for catalog operations.
#[derive(Debug)]
pub enum IcatError {
    /// Operation needs a session and none is open
    NotLoggedIn,
    /// Network error
    Network(String),
    /// HTTP error without an ICAT error body
    Http(u16, String),
    /// icat.server reported an error (`{"code": ..., "message": ...}`)
    Server { status: u16, code: String, message: String },
    /// Unexpected response shape
    Parse(String),
}

impl IcatError {
    /// ICAT error code, if the server supplied one.
    pub fn server_code(&self) -> Option<&str> {
        match self {
            Self::Server { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn is_session_error(&self) -> bool {
        matches!(self, Self::NotLoggedIn) || self.server_code() == Some("SESSION")
    }
}

impl std::fmt::Display for IcatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IcatError::NotLoggedIn => write!(f, "not logged in to ICAT"),
            IcatError::Network(msg) => write!(f, "network error: {}", msg),
            IcatError::Http(code, msg) => write!(f, "HTTP {}: {}", code, msg),
            IcatError::Server { code, message, .. } => write!(f, "ICAT {}: {}", code, message),
            IcatError::Parse(msg) => write!(f, "unexpected response: {}", msg),
        }
    }
}

impl std::error::Error for IcatError {}

/// HTTP-level options for a client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Verify the server TLS certificate.
    pub check_cert: bool,
    pub timeout: Duration,
    pub chunk_size: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            check_cert: true,
            timeout: Duration::from_secs(60),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// ICAT API client (blocking).
pub struct IcatClient {
    http: reqwest::blocking::Client,
    base_url: String,
    session_id: Option<String>,
    chunk_size: usize,
}

impl IcatClient {
    /// Create a client for the ICAT service at `url` (without `/icat`).
    pub fn new(url: &str, opts: &ClientOptions) -> Result<Self, IcatError> {
        let http = build_http(opts)?;
        Ok(Self {
            http,
            base_url: url.trim_end_matches('/').to_string(),
            session_id: None,
            chunk_size: opts.chunk_size.max(1),
        })
    }

    /// Attach an existing session instead of logging in.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Log in with an authenticator plugin (`simple`, `ldap`, ...) and an
    /// ordered list of credential key/value pairs.
    pub fn login(&mut self, plugin: &str, credentials: &[(String, String)]) -> Result<(), IcatError> {
        let creds: Vec<Value> = credentials
            .iter()
            .map(|(k, v)| {
                let mut m = Map::new();
                m.insert(k.clone(), Value::String(v.clone()));
                Value::Object(m)
            })
            .collect();
        let body = serde_json::json!({ "plugin": plugin, "credentials": creds });

        let url = format!("{}/icat/session", self.base_url);
        let resp = self.http.post(&url)
            .form(&[("json", body.to_string())])
            .send()
            .map_err(|e| IcatError::Network(e.to_string()))?;
        let json: Value = read_json(resp)?;

        let sid = json["sessionId"].as_str()
            .ok_or_else(|| IcatError::Parse("missing sessionId in login response".into()))?;
        debug!(plugin, "logged in to {}", self.base_url);
        self.session_id = Some(sid.to_string());
        Ok(())
    }

    /// Close the session on the server. A client without a session is a no-op.
    pub fn logout(&mut self) -> Result<(), IcatError> {
        let Some(sid) = self.session_id.take() else {
            return Ok(());
        };
        let url = format!("{}/icat/session/{}", self.base_url, sid);
        let resp = self.http.delete(&url)
            .send()
            .map_err(|e| IcatError::Network(e.to_string()))?;
        check_status(resp)?;
        Ok(())
    }

    /// Server version string, e.g. `"5.0.0"`.
    pub fn version(&self) -> Result<String, IcatError> {
        let url = format!("{}/icat/version", self.base_url);
        let resp = self.http.get(&url)
            .send()
            .map_err(|e| IcatError::Network(e.to_string()))?;
        let json: Value = read_json(resp)?;
        json["version"].as_str()
            .map(String::from)
            .ok_or_else(|| IcatError::Parse("missing version in response".into()))
    }

    /// Run a search and return the raw result list.
    pub fn search(&self, query: &Query) -> Result<Vec<Value>, IcatError> {
        self.search_str(&query.render())
    }

    pub fn search_str(&self, query: &str) -> Result<Vec<Value>, IcatError> {
        let sid = self.require_session()?;
        debug!(query, "search");
        let url = format!("{}/icat/entityManager", self.base_url);
        let resp = self.http.get(&url)
            .query(&[("sessionId", sid), ("query", query)])
            .send()
            .map_err(|e| IcatError::Network(e.to_string()))?;
        let json: Value = read_json(resp)?;
        match json {
            Value::Array(items) => Ok(items),
            other => Err(IcatError::Parse(format!("search result is not a list: {other}"))),
        }
    }

    /// Search in pages of the client chunk size.
    ///
    /// Queries without an explicit order are sorted by id so that pages
    /// stay stable while the caller updates the objects it receives.
    pub fn search_chunked<'a>(
        &'a self,
        query: &Query,
    ) -> Chunked<Value, impl FnMut(usize, usize) -> Result<Vec<Value>, IcatError> + 'a> {
        let base = if query.has_order() { query.clone() } else { query.clone().order_by("id") };
        Chunked::new(self.chunk_size, move |offset, count| {
            self.search(&base.clone().limit(offset, count))
        })
    }

    /// Run an aggregate query that must produce exactly one value.
    /// `SUM` over no rows comes back as `null` and maps to `None`.
    pub fn aggregate(&self, query: &Query) -> Result<Option<i64>, IcatError> {
        let result = self.search(query)?;
        let [value] = result.as_slice() else {
            return Err(IcatError::Parse(format!(
                "expected one aggregate value for `{}`, got {}",
                query.render(),
                result.len(),
            )));
        };
        match value {
            Value::Null => Ok(None),
            v => v.as_i64()
                .or_else(|| v.as_f64().and_then(integral_f64))
                .map(Some)
                .ok_or_else(|| IcatError::Parse(format!("aggregate is not an integer: {v}"))),
        }
    }

    /// Search expecting exactly one object, returned unwrapped.
    pub fn search_one(&self, query: &Query) -> Result<Map<String, Value>, IcatError> {
        let result = self.search(query)?;
        match result.as_slice() {
            [single] => unwrap_entity(single, query.entity()).cloned(),
            other => Err(IcatError::Parse(format!(
                "expected exactly one {} for `{}`, got {}",
                query.entity(),
                query.render(),
                other.len(),
            ))),
        }
    }

    /// Create one object and return its id.
    pub fn create(&self, entity: &str, fields: Map<String, Value>) -> Result<i64, IcatError> {
        let ids = self.write(vec![wrap_entity(entity, fields)])?;
        ids.first().copied()
            .ok_or_else(|| IcatError::Parse("create returned no id".into()))
    }

    /// Update the given fields of an existing object.
    pub fn update(&self, entity: &str, id: i64, mut fields: Map<String, Value>) -> Result<(), IcatError> {
        fields.insert("id".into(), Value::from(id));
        self.write(vec![wrap_entity(entity, fields)])?;
        Ok(())
    }

    /// Whether the server schema knows `entity.attribute`.
    ///
    /// Issues a one-row projection; `BAD_PARAMETER` means the attribute
    /// does not exist. Any other failure is returned as an error.
    pub fn probe_attribute(&self, entity: &str, attribute: &str) -> Result<bool, IcatError> {
        let query = Query::new(entity).attribute(attribute).limit(0, 1);
        match self.search(&query) {
            Ok(_) => Ok(true),
            Err(e) if e.server_code() == Some("BAD_PARAMETER") => {
                debug!(entity, attribute, "attribute probe rejected: {e}");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn write(&self, entities: Vec<Value>) -> Result<Vec<i64>, IcatError> {
        let sid = self.require_session()?;
        let url = format!("{}/icat/entityManager", self.base_url);
        let resp = self.http.post(&url)
            .form(&[("sessionId", sid.to_string()), ("entities", Value::Array(entities).to_string())])
            .send()
            .map_err(|e| IcatError::Network(e.to_string()))?;
        let json: Value = read_json(resp)?;
        match json {
            Value::Array(ids) => Ok(ids.iter().filter_map(Value::as_i64).collect()),
            Value::Number(n) => Ok(n.as_i64().into_iter().collect()),
            other => Err(IcatError::Parse(format!("unexpected write response: {other}"))),
        }
    }

    fn require_session(&self) -> Result<&str, IcatError> {
        self.session_id.as_deref().ok_or(IcatError::NotLoggedIn)
    }
}

// ── Free functions ──────────────────────────────────────────────────

pub(crate) fn build_http(opts: &ClientOptions) -> Result<reqwest::blocking::Client, IcatError> {
    reqwest::blocking::Client::builder()
        .user_agent(format!("icatadm/{}", env!("CARGO_PKG_VERSION")))
        .timeout(opts.timeout)
        .danger_accept_invalid_certs(!opts.check_cert)
        .build()
        .map_err(|e| IcatError::Network(format!("cannot build HTTP client: {e}")))
}

/// Map a non-success response to an error, keeping the ICAT error body.
pub(crate) fn check_status(
    resp: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, IcatError> {
    let status = resp.status().as_u16();
    if resp.status().is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    if let Ok(json) = serde_json::from_str::<Value>(&body) {
        if let (Some(code), Some(message)) = (json["code"].as_str(), json["message"].as_str()) {
            return Err(IcatError::Server {
                status,
                code: code.to_string(),
                message: message.to_string(),
            });
        }
    }
    Err(IcatError::Http(status, body))
}

pub(crate) fn read_json(resp: reqwest::blocking::Response) -> Result<Value, IcatError> {
    let resp = check_status(resp)?;
    resp.json::<Value>().map_err(|e| IcatError::Parse(e.to_string()))
}

/// `{"Dataset": {...}}` → the inner object.
pub fn unwrap_entity<'a>(value: &'a Value, entity: &str) -> Result<&'a Map<String, Value>, IcatError> {
    value.get(entity)
        .and_then(Value::as_object)
        .ok_or_else(|| IcatError::Parse(format!("expected a {entity} object, got {value}")))
}

fn wrap_entity(entity: &str, fields: Map<String, Value>) -> Value {
    let mut outer = Map::new();
    outer.insert(entity.to_string(), Value::Object(fields));
    Value::Object(outer)
}

/// Aggregates may arrive as JSON doubles; only whole values in `i64` range
/// are accepted.
fn integral_f64(f: f64) -> Option<i64> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0; // 2^63
    (f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f)).then_some(f as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integral_f64() {
        assert_eq!(integral_f64(60.0), Some(60));
        assert_eq!(integral_f64(-3.0), Some(-3));
        assert_eq!(integral_f64(12.5), None);
        assert_eq!(integral_f64(f64::NAN), None);
        assert_eq!(integral_f64(f64::INFINITY), None);
        assert_eq!(integral_f64(1e19), None);
    }

    #[test]
    fn test_unwrap_entity() {
        let v = serde_json::json!({"Dataset": {"id": 3, "name": "raw"}});
        let inner = unwrap_entity(&v, "Dataset").unwrap();
        assert_eq!(inner["id"], 3);

        let err = unwrap_entity(&v, "Investigation").unwrap_err();
        assert!(matches!(err, IcatError::Parse(_)));
    }

    #[test]
    fn test_wrap_entity() {
        let mut fields = Map::new();
        fields.insert("fileCount".into(), Value::from(3));
        let v = wrap_entity("Dataset", fields);
        assert_eq!(v, serde_json::json!({"Dataset": {"fileCount": 3}}));
    }

    #[test]
    fn test_error_display() {
        let err = IcatError::Server {
            status: 400,
            code: "BAD_PARAMETER".into(),
            message: "bad attribute".into(),
        };
        assert_eq!(err.to_string(), "ICAT BAD_PARAMETER: bad attribute");
        assert_eq!(err.server_code(), Some("BAD_PARAMETER"));
        assert!(!err.is_session_error());
        assert!(IcatError::NotLoggedIn.is_session_error());
    }

    #[test]
    fn test_requires_session() {
        let client = IcatClient::new("http://localhost:1", &ClientOptions::default()).unwrap();
        let err = client.search(&Query::new("Investigation")).unwrap_err();
        assert!(matches!(err, IcatError::NotLoggedIn));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = IcatClient::new("https://icat.example.org/", &ClientOptions::default()).unwrap();
        assert_eq!(client.base_url(), "https://icat.example.org");
    }
}
