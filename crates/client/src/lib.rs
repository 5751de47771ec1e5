//! ICAT API client, shared by all `icatadm` commands.
//!
//! Single source of truth for the ICAT/IDS wire contract: session handling,
//! query rendering, paged search, entity create/update, datafile upload.
//!
//! No retries. No knowledge of what the commands check.

mod client;
mod cursor;
mod ids;
pub mod query;

pub use client::{
    IcatClient, IcatError, ClientOptions, DEFAULT_CHUNK_SIZE,
    unwrap_entity,
};
pub use cursor::Chunked;
pub use ids::{IdsClient, DatafileUpload};
pub use query::{Query, Aggregate, Op, Literal};
