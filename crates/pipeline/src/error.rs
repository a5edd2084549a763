#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A secondary callback returned an error or panicked. Logged, never propagated.
    #[error("callback dispatch failed: {0}")]
    CallbackDispatch(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(String),

    #[error("api_url must not be empty")]
    MissingApiUrl,
}

pub type Result<T> = std::result::Result<T, PipelineError>;
