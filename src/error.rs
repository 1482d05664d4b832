use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimekeeperError {
    #[error("row {line}: expected {expected} fields, found {found}")]
    Format {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("failed to read timesheet rows: {0}")]
    Csv(#[from] csv::Error),

    #[error("{task} is not a valid labor task name for the prefix {prefix}")]
    NotFound { task: String, prefix: String },

    #[error("{method} {url} failed: {source}")]
    Transport {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("{method} {url} returned status {status}: {body}")]
    HttpStatus {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("unexpected response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid url {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("invalid date '{date}': {message}")]
    InvalidDate { date: String, message: String },

    #[error("failed to build authorization header: {0}")]
    Auth(String),

    #[error("after {retries} retries we still failed. Response code: {}", display_status(.status))]
    RetryExhausted {
        status: Option<u16>,
        body: String,
        retries: u32,
    },

    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("missing or invalid setting: {0}")]
    MissingSetting(String),
}

fn display_status(status: &Option<u16>) -> String {
    status.map_or_else(|| "none".to_string(), |s| s.to_string())
}

pub type Result<T> = std::result::Result<T, TimekeeperError>;
