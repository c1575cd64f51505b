use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("analytics: empty input")]
    EmptyInput,

    #[error("analytics: API error: {0}")]
    Api(String),

    #[error("analytics: timed out after {0:?}")]
    Timeout(Duration),

    #[error("analytics: invalid response: {0}")]
    InvalidResponse(String),

    #[error("analytics: service not configured")]
    NotConfigured,
}
