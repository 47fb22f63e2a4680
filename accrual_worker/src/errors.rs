use loyalty_engine::accrual::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid worker configuration. {0}")]
    ConfigurationError(String),
    #[error("Could not initialize the accrual worker. {0}")]
    InitializeError(String),
    #[error("The accrual engine stopped with an error. {0}")]
    EngineError(#[from] EngineError),
    #[error("The accrual engine did not stop within {0:?}")]
    ShutdownTimeout(std::time::Duration),
}
