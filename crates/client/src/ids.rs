//! Minimal IDS (ICAT Data Service) client: datafile upload only.

use std::io::Read;

use serde_json::Value;
use tracing::debug;

use crate::client::{build_http, check_status, ClientOptions, IcatError};

/// Metadata of a datafile to be created by an upload.
#[derive(Debug, Clone)]
pub struct DatafileUpload {
    pub name: String,
    pub dataset_id: i64,
    pub datafile_format_id: i64,
    pub description: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub create_time_ms: Option<i64>,
    /// Milliseconds since the Unix epoch.
    pub mod_time_ms: Option<i64>,
}

/// IDS API client (blocking).
pub struct IdsClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl IdsClient {
    /// Create a client for the IDS service at `url` (without `/ids`).
    pub fn new(url: &str, opts: &ClientOptions) -> Result<Self, IcatError> {
        Ok(Self {
            http: build_http(opts)?,
            base_url: url.trim_end_matches('/').to_string(),
        })
    }

    /// Stream `body` into a new datafile. Returns the datafile id.
    ///
    /// The body is sent chunked, read by the HTTP client as the server
    /// accepts it, so a slow reader keeps the request open.
    pub fn put<R>(&self, session_id: &str, upload: &DatafileUpload, body: R) -> Result<i64, IcatError>
    where
        R: Read + Send + 'static,
    {
        let mut params: Vec<(&str, String)> = vec![
            ("sessionId", session_id.to_string()),
            ("name", upload.name.clone()),
            ("datasetId", upload.dataset_id.to_string()),
            ("datafileFormatId", upload.datafile_format_id.to_string()),
        ];
        if let Some(ref d) = upload.description {
            params.push(("description", d.clone()));
        }
        if let Some(t) = upload.create_time_ms {
            params.push(("datafileCreateTime", t.to_string()));
        }
        if let Some(t) = upload.mod_time_ms {
            params.push(("datafileModTime", t.to_string()));
        }

        debug!(name = %upload.name, dataset = upload.dataset_id, "IDS put");
        let url = format!("{}/ids/put", self.base_url);
        let resp = self.http.put(&url)
            .query(&params)
            .header("Content-Type", "application/octet-stream")
            .body(reqwest::blocking::Body::new(body))
            .send()
            .map_err(|e| IcatError::Network(e.to_string()))?;
        let text = check_status(resp)?
            .text()
            .map_err(|e| IcatError::Network(e.to_string()))?;
        parse_put_response(&text)
    }
}

/// Older ids.server versions answer with the bare id, newer ones with
/// `{"id": ..., "checksum": ...}`.
fn parse_put_response(text: &str) -> Result<i64, IcatError> {
    let trimmed = text.trim();
    if let Ok(id) = trimmed.parse::<i64>() {
        return Ok(id);
    }
    let json: Value = serde_json::from_str(trimmed)
        .map_err(|e| IcatError::Parse(format!("IDS put response: {e}")))?;
    json["id"].as_i64()
        .ok_or_else(|| IcatError::Parse(format!("IDS put response has no id: {trimmed}")))
}
