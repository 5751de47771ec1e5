// ids-bug164: trigger the LockManager bug of ids.server (issue 164).
//
// Creates a dataset and uploads two datafiles into it, the second one
// slowly, so that ids.server starts the deferred WRITE of the first upload
// while the second is still running and takes two shared locks on the same
// dataset. The effect is only visible in the server log.

use std::io::{Cursor, Read};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use icatadm_client::{DatafileUpload, IcatClient, IcatError, IdsClient, Query};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::CliError;

pub const DATASET_NAME: &str = "test-upload-ids-bug164";
const DATASET_DESCRIPTION: &str = "Testing ids.server Issue #164";

/// Bytes handed out per read by the slow upload.
const SLOW_CHUNK: usize = 10;
/// Pause before each read of the slow upload.
pub const SLOW_DELAY: Duration = Duration::from_secs(2);

const LOREM: &[u8] = b"Lorem ipsum dolor sit amet, consectetur adipisici elit, sed eiusmod \
tempor incidunt ut labore et dolore magna aliqua. Ut enim ad minim veniam, quis nostrud \
exercitation ullamco laboris nisi ut aliquid ex ea commodi consequat. Quis aute iure \
reprehenderit in voluptate velit esse cillum dolore eu fugiat nulla pariatur. Excepteur sint \
obcaecat cupiditat non proident, sunt in culpa qui officia deserunt mollit anim id est laborum.\n";

/// Reader that yields at most `chunk` bytes per call, sleeping first.
pub struct SlowReader<R> {
    inner: R,
    chunk: usize,
    delay: Duration,
}

impl<R: Read> SlowReader<R> {
    pub fn new(inner: R, chunk: usize, delay: Duration) -> Self {
        Self { inner, chunk: chunk.max(1), delay }
    }
}

impl<R: Read> Read for SlowReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = buf.len().min(self.chunk);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.inner.read(&mut buf[..n])
    }
}

pub fn cmd_ids_bug164(client: &IcatClient, ids: &IdsClient, investigation: &str) -> Result<(), CliError> {
    warn!("ids.server instances affected by issue 164 lose their FSM thread; restart may be needed");
    let (dataset, files) = upload_test_dataset(client, ids, investigation, SLOW_DELAY)?;
    info!(
        "Uploaded {} datafile(s) to {DATASET_NAME} (id {dataset}); check the ids.server log",
        files.len()
    );
    Ok(())
}

/// Create the test dataset in `investigation` and upload both files.
/// Returns the dataset id and the datafile ids.
pub fn upload_test_dataset(
    client: &IcatClient,
    ids: &IdsClient,
    investigation: &str,
    delay: Duration,
) -> Result<(i64, Vec<i64>), CliError> {
    let session = client
        .session_id()
        .ok_or_else(|| CliError::icat(IcatError::NotLoggedIn))?
        .to_string();

    let inv = lookup_id(client, Query::new("Investigation").where_eq("name", investigation))
        .map_err(|e| e.with_hint(format!("investigation names must be unique: {investigation:?}")))?;
    let dataset_type = lookup_id(client, Query::new("DatasetType").limit(0, 1))?;
    let format = lookup_id(client, Query::new("DatafileFormat").limit(0, 1))?;

    let mut fields = Map::new();
    fields.insert("investigation".into(), json!({ "id": inv }));
    fields.insert("type".into(), json!({ "id": dataset_type }));
    fields.insert("name".into(), Value::from(DATASET_NAME));
    fields.insert("complete".into(), Value::from(false));
    fields.insert("description".into(), Value::from(DATASET_DESCRIPTION));
    let dataset = client.create("Dataset", fields).map_err(CliError::icat)?;
    info!("Created Dataset {DATASET_NAME} (id {dataset})");

    let mod_time = Utc::now().timestamp_millis();
    let upload = |name: &str| DatafileUpload {
        name: name.to_string(),
        dataset_id: dataset,
        datafile_format_id: format,
        description: None,
        create_time_ms: Some(mod_time),
        mod_time_ms: Some(mod_time),
    };

    let first = ids
        .put(&session, &upload("Lorem-1.txt"), Cursor::new(LOREM))
        .map_err(CliError::icat)?;
    info!("Uploaded Lorem-1.txt (id {first})");

    let slow = SlowReader::new(Cursor::new(LOREM), SLOW_CHUNK, delay);
    let second = ids
        .put(&session, &upload("Lorem-2.txt"), slow)
        .map_err(CliError::icat)?;
    info!("Uploaded Lorem-2.txt (id {second})");

    Ok((dataset, vec![first, second]))
}

fn lookup_id(client: &IcatClient, query: Query) -> Result<i64, CliError> {
    let obj = client.search_one(&query).map_err(CliError::icat)?;
    obj.get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| CliError::icat(IcatError::Parse(format!("{} without id", query.entity()))))
}
