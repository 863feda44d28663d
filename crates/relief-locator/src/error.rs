use relief_core::error::{CoreError, MappingError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("config error: {0}")]
    Config(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MappingError> for AppError {
    fn from(err: MappingError) -> Self {
        AppError::Core(CoreError::Mapping(err))
    }
}
