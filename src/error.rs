use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("The selector you are trying to scrape for is missing. Selector: {0}")]
    ParseMissingSelector(String),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Csv Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Table {path} has no `{column}` column")]
    MissingColumn { path: PathBuf, column: String },

    #[error("Invalid label `{value}` in data row {row} of {path}")]
    InvalidLabel {
        path: PathBuf,
        /// 1-based, header not counted.
        row: usize,
        value: String,
    },

    #[error("Checkpoint {path} has columns {found:?}, the input has {expected:?}")]
    CheckpointMismatch {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Couldn't replace {path} with the new checkpoint: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config Error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No API key found. Set OPENAI_API_KEY or put the key in {0}")]
    MissingApiKey(PathBuf),

    #[error("API error: HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("The model returned no message content")]
    EmptyResponse,
}

