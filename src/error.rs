//! Error types for body setup and evaluation.

use thiserror::Error;

/// Kind of attached element, used in diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Connection,
    Rod,
}

impl std::fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttachmentKind::Connection => write!(f, "connection"),
            AttachmentKind::Rod => write!(f, "rod"),
        }
    }
}

/// Errors raised while building or evaluating a body.
#[derive(Debug, Error)]
pub enum BodyError {
    /// Input row or table could not be parsed.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Description of the parse failure.
        reason: String,
    },

    /// Physically invalid body property.
    #[error("body {body}: invalid property: {reason}")]
    InvalidProperty {
        /// Body identifier.
        body: usize,
        /// Description of the invalid property.
        reason: String,
    },

    /// Too many connections or rods attached to one body.
    #[error("body {body}: cannot attach more than {capacity} {kind}s")]
    CapacityExceeded {
        /// Body identifier.
        body: usize,
        /// Kind of attachment that overflowed.
        kind: AttachmentKind,
        /// Maximum number of attachments of this kind.
        capacity: usize,
    },

    /// Attachment index does not refer to an element handed to the body.
    #[error("body {body}: {kind} {index} is not available ({available} given)")]
    UnknownAttachment {
        /// Body identifier.
        body: usize,
        /// Kind of attachment.
        kind: AttachmentKind,
        /// Requested index.
        index: usize,
        /// Number of elements supplied by the caller.
        available: usize,
    },

    /// NaN or infinity in the body state or its derived quantities.
    #[error("body {body}: non-finite {quantity} at t = {time}")]
    NonFinite {
        /// Body identifier.
        body: usize,
        /// Simulation time.
        time: f64,
        /// Offending quantity.
        quantity: &'static str,
    },

    /// Combined mass matrix could not be factored.
    #[error("body {body}: mass matrix is not positive definite at t = {time}")]
    SingularMass {
        /// Body identifier.
        body: usize,
        /// Simulation time.
        time: f64,
    },

    /// Step protocol violated.
    #[error("body {body}: {operation} called in phase {found:?}")]
    OutOfPhase {
        /// Body identifier.
        body: usize,
        /// Operation that was attempted.
        operation: &'static str,
        /// Phase the body was in.
        found: crate::body::StepPhase,
    },

    /// Operation does not apply to this body type.
    #[error("body {body}: {operation} is not valid for {found} bodies")]
    WrongBodyType {
        /// Body identifier.
        body: usize,
        /// Operation that was attempted.
        operation: &'static str,
        /// Type name of the body.
        found: &'static str,
    },

    /// Output file could not be opened or written.
    #[error("output file error: {0}")]
    Io(#[from] std::io::Error),
}

impl BodyError {
    /// Create an invalid input error.
    #[must_use]
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Create an invalid property error.
    #[must_use]
    pub fn invalid_property(body: usize, reason: impl Into<String>) -> Self {
        Self::InvalidProperty {
            body,
            reason: reason.into(),
        }
    }

    /// Configuration errors abort model loading.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. } | Self::InvalidProperty { .. }
        )
    }

    #[must_use]
    pub fn is_capacity(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. })
    }

    /// Numerical errors abort a running simulation.
    #[must_use]
    pub fn is_numerical(&self) -> bool {
        matches!(self, Self::NonFinite { .. } | Self::SingularMass { .. })
    }
}

/// Process-wide status codes returned by the API layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
    Success = 0,
    InvalidInputFile = -1,
    InvalidOutputFile = -2,
    InvalidInput = -3,
    NanError = -4,
    MemError = -5,
    InvalidValue = -6,
    NonImplemented = -7,
    UnhandledError = -255,
}

impl Status {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<&BodyError> for Status {
    fn from(err: &BodyError) -> Self {
        match err {
            BodyError::InvalidInput { .. } => Status::InvalidInput,
            BodyError::InvalidProperty { .. } => Status::InvalidValue,
            BodyError::CapacityExceeded { .. } => Status::MemError,
            BodyError::UnknownAttachment { .. } => Status::InvalidValue,
            BodyError::NonFinite { .. } | BodyError::SingularMass { .. } => Status::NanError,
            BodyError::OutOfPhase { .. } | BodyError::WrongBodyType { .. } => {
                Status::UnhandledError
            }
            BodyError::Io(_) => Status::InvalidOutputFile,
        }
    }
}

impl<T> From<&Result<T, BodyError>> for Status {
    fn from(res: &Result<T, BodyError>) -> Self {
        match res {
            Ok(_) => Status::Success,
            Err(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BodyError::CapacityExceeded {
            body: 3,
            kind: AttachmentKind::Rod,
            capacity: 30,
        };
        assert!(err.to_string().contains("30 rods"));

        let err = BodyError::NonFinite {
            body: 7,
            time: 1.5,
            quantity: "acceleration",
        };
        let msg = err.to_string();
        assert!(msg.contains("body 7"));
        assert!(msg.contains("1.5"));
    }

    #[test]
    fn test_error_classes() {
        let err = BodyError::invalid_property(1, "mass must be positive");
        assert!(err.is_configuration());
        assert!(!err.is_numerical());

        let err = BodyError::SingularMass { body: 1, time: 0. };
        assert!(err.is_numerical());
        assert!(!err.is_configuration());
        assert!(!err.is_capacity());
    }

    #[test]
    fn test_status_codes() {
        let err = BodyError::SingularMass { body: 1, time: 0. };
        assert_eq!(Status::from(&err).code(), -4);
        let err = BodyError::CapacityExceeded {
            body: 1,
            kind: AttachmentKind::Connection,
            capacity: 30,
        };
        assert_eq!(Status::from(&err), Status::MemError);
        assert_eq!(Status::from(&Ok::<(), BodyError>(())), Status::Success);
        assert_eq!(Status::UnhandledError.code(), -255);
    }
}
