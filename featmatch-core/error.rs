use thiserror::Error;

/// Errors raised while configuring or running a feature stage
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    /// A parameter, algorithm name or combination of algorithms is not usable
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Caller-supplied data violates the operation's input contract
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The vision backend rejected a descriptor computation
    #[error("Descriptor extraction failed: {0}")]
    Extraction(String),
}

impl FeatureError {
    pub fn config(msg: impl Into<String>) -> Self {
        FeatureError::InvalidConfiguration(msg.into())
    }

    pub fn input(msg: impl Into<String>) -> Self {
        FeatureError::InvalidInput(msg.into())
    }
}

pub type FeatureResult<T> = Result<T, FeatureError>;
