use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AccrualClientError {
    #[error("Could not initialize the accrual client: {0}")]
    Initialization(String),
    #[error("The request was cancelled")]
    Cancelled,
    #[error("The accrual service did not respond in time")]
    Timeout,
    #[error("Could not connect to the accrual service: {0}")]
    Connection(String),
    #[error("Accrual request failed: {0}")]
    Request(String),
    #[error("Unexpected response status {0} from the accrual service")]
    UnexpectedStatus(u16),
    #[error("Could not decode the accrual response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for AccrualClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connection(e.to_string())
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The discovery query failed. Without discovery there is no work, so this stops the whole engine.
    #[error("Could not discover pending orders: {0}")]
    Discovery(String),
    #[error("The {task} task failed: {reason}")]
    TaskFailed { task: &'static str, reason: String },
}
