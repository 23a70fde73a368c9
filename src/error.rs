use thiserror::Error;

use crate::store::RequestStatus;

/// Expected, recoverable business outcomes plus the two kinds of trouble that
/// are not: detected invariant breaches and storage failures.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("student not found: {0}")]
    StudentNotFound(String),

    #[error("class not found: {0}")]
    ClassNotFound(String),

    #[error("request not found: {0}")]
    RequestNotFound(String),

    #[error("student {student_id} is already enrolled in class {class_id}")]
    AlreadyEnrolled {
        student_id: String,
        class_id: String,
    },

    #[error("student {student_id} already has a pending request for class {class_id}")]
    DuplicatePending {
        student_id: String,
        class_id: String,
    },

    #[error("class {class_id} is full ({capacity} of {capacity} seats taken)")]
    CapacityExceeded { class_id: String, capacity: i64 },

    #[error("request {request_id} is already {status}")]
    InvalidTransition {
        request_id: String,
        status: RequestStatus,
    },

    #[error("student {student_id} is not enrolled in class {class_id}")]
    NotEnrolled {
        student_id: String,
        class_id: String,
    },

    /// A core invariant no sequence of valid operations can break was found
    /// broken. Indicates a bug, not a business condition.
    #[error("consistency violation: {0}")]
    Consistency(String),

    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

impl DomainError {
    /// Stable wire code for the IPC error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::StudentNotFound(_)
            | DomainError::ClassNotFound(_)
            | DomainError::RequestNotFound(_) => "not_found",
            DomainError::AlreadyEnrolled { .. } => "already_enrolled",
            DomainError::DuplicatePending { .. } => "duplicate_pending",
            DomainError::CapacityExceeded { .. } => "class_full",
            DomainError::InvalidTransition { .. } => "invalid_transition",
            DomainError::NotEnrolled { .. } => "not_enrolled",
            DomainError::Consistency(_) => "consistency",
            DomainError::Db(_) => "db_failed",
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
