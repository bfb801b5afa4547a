use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("unknown scenario: {0}")]
    UnknownScenario(String),
    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),
}

pub type StateResult<T> = std::result::Result<T, StateError>;
