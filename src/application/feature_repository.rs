// Repository trait for feature data access
use crate::domain::feature::FeatureRow;
use async_trait::async_trait;
use thiserror::Error;

/// Anything that went wrong talking to the warehouse
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("request to warehouse failed: {0}")]
    Transport(String),

    #[error("warehouse returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("statement {state}: {message}")]
    Statement { state: String, message: String },

    #[error("unexpected warehouse response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for QueryError {
    fn from(err: reqwest::Error) -> Self {
        QueryError::Transport(err.to_string())
    }
}

#[async_trait]
pub trait FeatureRepository: Send + Sync {
    /// All distinct feature names, ascending
    async fn list_distinct_features(&self) -> Result<Vec<String>, QueryError>;

    /// First `feature_analysis` row for the feature, with the name bound as a parameter
    async fn fetch_feature_row(&self, feature: &str) -> Result<Option<FeatureRow>, QueryError>;
}
