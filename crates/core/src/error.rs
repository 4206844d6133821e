use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("malformed path {path:?}: bad segment {segment:?}")]
    MalformedPath { path: String, segment: String },

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
