/// Only configuration mistakes fail a dispatch call; every per-channel
/// failure is captured inside the result instead.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown event type: {0}")]
    UnknownEvent(String),
}

pub type DispatchResult<T> = Result<T, DispatchError>;
