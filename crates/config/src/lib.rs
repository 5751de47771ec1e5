// Configuration loading

pub mod connection;

pub use connection::{
    load, resolve, ConfigError, ConfigFile, ConfigRequest, ConnectionConfig, SectionConfig,
    DEFAULT_AUTH, DEFAULT_CHUNK_SIZE, DEFAULT_SECTION,
};
