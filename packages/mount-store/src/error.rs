use storewrap_core::StorageError;

#[derive(thiserror::Error, Debug)]
pub enum MountError {
    #[error("no mount covers path '{path}'")]
    NoMount { path: String },

    #[error("nothing mounted at '{path}'")]
    NotMounted { path: String },

    #[error("invalid mount path: {0}")]
    InvalidPath(#[source] StorageError),

    #[error(transparent)]
    Factory(#[from] storewrap_core::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<storewrap_core::WrapperError> for MountError {
    fn from(error: storewrap_core::WrapperError) -> Self {
        MountError::Factory(error.into())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
