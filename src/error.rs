use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateErrorCode {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    Unimplemented,
    Internal,
}

impl StateErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateErrorCode::InvalidArgument => "state/invalid-argument",
            StateErrorCode::NotFound => "state/not-found",
            StateErrorCode::AlreadyExists => "state/already-exists",
            StateErrorCode::Unimplemented => "state/unimplemented",
            StateErrorCode::Internal => "state/internal",
        }
    }

    /// Numeric gRPC status code an adapter should answer with.
    pub fn grpc_status(&self) -> i32 {
        match self {
            StateErrorCode::InvalidArgument => 3,
            StateErrorCode::NotFound => 5,
            StateErrorCode::AlreadyExists => 6,
            StateErrorCode::Unimplemented => 12,
            StateErrorCode::Internal => 13,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateError {
    pub code: StateErrorCode,
    message: String,
}

impl StateError {
    pub fn new(code: StateErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    /// The backend-shaped diagnostic text, without the code suffix.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for StateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl Error for StateError {}

pub type StateResult<T> = Result<T, StateError>;

pub fn invalid_argument(message: impl Into<String>) -> StateError {
    StateError::new(StateErrorCode::InvalidArgument, message)
}

pub fn not_found(message: impl Into<String>) -> StateError {
    StateError::new(StateErrorCode::NotFound, message)
}

pub fn already_exists(message: impl Into<String>) -> StateError {
    StateError::new(StateErrorCode::AlreadyExists, message)
}

pub fn unimplemented(message: impl Into<String>) -> StateError {
    StateError::new(StateErrorCode::Unimplemented, message)
}

pub fn internal_error(message: impl Into<String>) -> StateError {
    StateError::new(StateErrorCode::Internal, message)
}
