use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Producer control error: {0}")]
    Producer(#[from] reqwest::Error),

    #[error("Unknown stage: {0}")]
    UnknownStage(u32),

    #[error("Stage activation failed: {0}")]
    Stage(String),

    #[error("Clock error: {0}")]
    Clock(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("HTTP server error: {0}")]
    Http(String),
}

pub type Result<T> = std::result::Result<T, DashboardError>;
