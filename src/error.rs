use thiserror::Error;

#[derive(Error, Debug)]
pub enum FramesmithError {
    /// Bad or missing caller input, detected before the engine is touched.
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Failed to load transcoding engine: {0}")]
    EngineLoad(String),

    #[error("Transcoding engine is not ready (attempted {operation})")]
    EngineNotReady { operation: &'static str },

    #[error("Transcoding engine is busy with another run")]
    EngineBusy,

    #[error("Engine invocation {argv:?} failed: {cause}")]
    EngineExecution { argv: Vec<String>, cause: String },

    #[error("Could not determine file extension for '{0}'")]
    InvalidFilename(String),

    #[error("Frame '{file}' has extension '{found}', expected '{expected}' like the first frame")]
    MixedExtension {
        expected: String,
        found: String,
        file: String,
    },

    #[error("Working storage {operation} failed for '{name}': {source}")]
    Storage {
        operation: &'static str,
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Run cancelled before staging")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl FramesmithError {
    pub(crate) fn storage(operation: &'static str, name: impl Into<String>, source: std::io::Error) -> Self {
        Self::Storage {
            operation,
            name: name.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, FramesmithError>;
