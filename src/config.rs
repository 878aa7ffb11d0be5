//! Configuration loaded from environment variables.

use {std::env, std::time::Duration};

const DEFAULT_DATA_BUCKET: &str = "datalake";
const DEFAULT_RESULT_BUCKET: &str = "processed-data";
const DEFAULT_SNAPSHOT_OBJECT: &str = "out.csv";
const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct Config {
    /// Endpoint of the object-store transport, handed to whichever
    /// `ObjectStore` implementation gets wired in.
    pub store_endpoint: String,
    /// Credentials for the transport, when it needs any.
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Bucket holding the per-user source objects.
    pub data_bucket: String,
    /// Bucket receiving the exported snapshot.
    pub result_bucket: String,
    /// Object key of the exported snapshot inside the result bucket.
    pub snapshot_object: String,
    /// How often staged changes are flushed into the published aggregate.
    pub flush_interval: Duration,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => {
                write!(f, "missing environment variable: {}", var)
            }
            ConfigError::InvalidValue(msg) => {
                write!(f, "invalid configuration value: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load configuration from environment variables. Only the flush
    /// interval is validated here; bucket names are taken as-is.
    pub fn from_env() -> Result<Self, ConfigError> {
        let store_endpoint =
            env::var("STORE_ENDPOINT").unwrap_or_else(|_| "localhost:9000".to_string());
        let access_key = env::var("STORE_ACCESS_KEY").ok();
        let secret_key = env::var("STORE_SECRET_KEY").ok();

        let data_bucket =
            env::var("DATA_BUCKET").unwrap_or_else(|_| DEFAULT_DATA_BUCKET.to_string());
        let result_bucket =
            env::var("RESULT_BUCKET").unwrap_or_else(|_| DEFAULT_RESULT_BUCKET.to_string());
        let snapshot_object =
            env::var("SNAPSHOT_OBJECT").unwrap_or_else(|_| DEFAULT_SNAPSHOT_OBJECT.to_string());

        let flush_interval_secs = match env::var("FLUSH_INTERVAL_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue(format!(
                    "FLUSH_INTERVAL_SECS must be an integer number of seconds, got {:?}",
                    raw
                ))
            })?,
            Err(_) => DEFAULT_FLUSH_INTERVAL_SECS,
        };
        if flush_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "FLUSH_INTERVAL_SECS must be positive".to_string(),
            ));
        }

        Ok(Self {
            store_endpoint,
            access_key,
            secret_key,
            data_bucket,
            result_bucket,
            snapshot_object,
            flush_interval: Duration::from_secs(flush_interval_secs),
        })
    }
}
