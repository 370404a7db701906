//! Tri-state outcome of a single access attempt.
//!
//! An [`AccessResult`] is exactly one of: data, unavailable, or an error.
//! Carrying both data and an error is unrepresentable.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// ERROR KIND
// ============================================================================

/// Integer-coded classification of an access failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Generic or unclassified failure
    Undefined,
    /// A source reported a failure
    DataAccess,
    /// A requested limit id matches no configured access
    DataAccessNotFound,
    /// Operation attempted on a closed hub
    InvalidState,
}

impl ErrorKind {
    /// Stable integer code for this kind.
    pub fn code(&self) -> i32 {
        match self {
            ErrorKind::Undefined => 0,
            ErrorKind::DataAccess => 1,
            ErrorKind::DataAccessNotFound => 2,
            ErrorKind::InvalidState => 3,
        }
    }

    /// Map an integer code back to its kind. Unknown codes are `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(ErrorKind::Undefined),
            1 => Some(ErrorKind::DataAccess),
            2 => Some(ErrorKind::DataAccessNotFound),
            3 => Some(ErrorKind::InvalidState),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Undefined => "UNDEFINED",
            ErrorKind::DataAccess => "DATA_ACCESS",
            ErrorKind::DataAccessNotFound => "DATA_ACCESS_NOT_FOUND",
            ErrorKind::InvalidState => "INVALID_STATE",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = ErrorKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UNDEFINED" => Ok(ErrorKind::Undefined),
            "DATA_ACCESS" => Ok(ErrorKind::DataAccess),
            "DATA_ACCESS_NOT_FOUND" => Ok(ErrorKind::DataAccessNotFound),
            "INVALID_STATE" => Ok(ErrorKind::InvalidState),
            _ => Err(ErrorKindParseError(s.to_string())),
        }
    }
}

/// Error when parsing an [`ErrorKind`] from its name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid error kind: {0}")]
pub struct ErrorKindParseError(pub String);

// ============================================================================
// ACCESS ERROR
// ============================================================================

/// Opaque caller-supplied payload attached to an [`AccessError`].
///
/// The core never inspects it; callers recover it with [`ErrorTag::downcast_ref`].
#[derive(Clone)]
pub struct ErrorTag(Arc<dyn Any + Send + Sync>);

impl ErrorTag {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for ErrorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorTag(..)")
    }
}

/// A failure delivered through the result channel.
#[derive(Debug, Clone, Error)]
#[error("{kind} ({code}): {message}", code = .kind.code())]
pub struct AccessError {
    kind: ErrorKind,
    message: String,
    tag: Option<ErrorTag>,
}

impl AccessError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            tag: None,
        }
    }

    /// A source-reported failure.
    pub fn data_access(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DataAccess, message)
    }

    /// A limit id that matches no configured access.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DataAccessNotFound, message)
    }

    /// An operation attempted on a closed hub.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidState, message)
    }

    /// Attach an opaque tag.
    pub fn with_tag(mut self, tag: ErrorTag) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> i32 {
        self.kind.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn tag(&self) -> Option<&ErrorTag> {
        self.tag.as_ref()
    }
}

// ============================================================================
// ACCESS RESULT
// ============================================================================

/// Outcome of an access attempt. Immutable once constructed.
#[derive(Debug, Clone)]
pub enum AccessResult<V> {
    /// The access produced a value
    Data(V),
    /// The access has nothing to offer right now
    Unavailable,
    /// The access failed
    Error(AccessError),
}

impl<V> AccessResult<V> {
    /// Build from an optional value; `None` is treated as unavailable.
    pub fn from_result(data: Option<V>) -> Self {
        match data {
            Some(value) => AccessResult::Data(value),
            None => AccessResult::Unavailable,
        }
    }

    pub fn from_data(data: V) -> Self {
        AccessResult::Data(data)
    }

    pub fn unavailable() -> Self {
        AccessResult::Unavailable
    }

    pub fn from_error(error: AccessError) -> Self {
        AccessResult::Error(error)
    }

    /// True iff there is no error and data is present.
    pub fn has_data(&self) -> bool {
        matches!(self, AccessResult::Data(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, AccessResult::Error(_))
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, AccessResult::Unavailable)
    }

    pub fn data(&self) -> Option<&V> {
        match self {
            AccessResult::Data(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&AccessError> {
        match self {
            AccessResult::Error(error) => Some(error),
            _ => None,
        }
    }

    pub fn into_data(self) -> Option<V> {
        match self {
            AccessResult::Data(value) => Some(value),
            _ => None,
        }
    }

    /// Transform the carried value, leaving unavailable and error untouched.
    pub fn map<U>(self, f: impl FnOnce(V) -> U) -> AccessResult<U> {
        match self {
            AccessResult::Data(value) => AccessResult::Data(f(value)),
            AccessResult::Unavailable => AccessResult::Unavailable,
            AccessResult::Error(error) => AccessResult::Error(error),
        }
    }
}

impl<V> From<AccessError> for AccessResult<V> {
    fn from(error: AccessError) -> Self {
        AccessResult::Error(error)
    }
}

// =============================================================================
// TESTS
// =============================================================================
