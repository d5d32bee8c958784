use thiserror::Error;

/// Pipeline error taxonomy. Every stage propagates these to the process
/// boundary; there are no partial-success exits.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Store, registry or upstream API unreachable, auth failure, or retry
    /// budget exhausted.
    #[error("connection error: {0}")]
    Connection(String),

    /// Empty or malformed history / API response.
    #[error("data error: {0}")]
    Data(String),

    /// Malformed feature vector, schema mismatch, or invalid caller input.
    #[error("input error: {0}")]
    Input(String),

    /// Regressor training or prediction failure.
    #[error("model error: {0}")]
    Model(String),
}

impl PipelineError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(error: reqwest::Error) -> Self {
        PipelineError::Connection(error.to_string())
    }
}

impl From<reqwest_middleware::Error> for PipelineError {
    fn from(error: reqwest_middleware::Error) -> Self {
        PipelineError::Connection(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = PipelineError::data("history is empty");
        assert_eq!(err.to_string(), "data error: history is empty");

        let err = PipelineError::input("schema mismatch at position 3");
        assert_eq!(err.to_string(), "input error: schema mismatch at position 3");
    }
}
