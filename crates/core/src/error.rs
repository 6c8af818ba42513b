use thiserror::Error;

#[derive(Debug, Error)]
pub enum CostError {
    #[error("malformed quantity: {0}")]
    MalformedQuantity(String),

    #[error("invalid usage value: {0}")]
    InvalidUsageValue(String),

    #[error("store not ready: {0}")]
    StoreNotReady(String),

    #[error("storage failure: {0}")]
    StorageFailure(String),

    #[error("cluster backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("insufficient history: need at least {required} data points, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CostError>;
