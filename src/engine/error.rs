use crate::model::{RowKey, SlotConflict, SlotStatus, VersionTag};
use crate::time::TimeError;

#[derive(Debug)]
pub enum EngineError {
    Validation(String),
    FieldNotFound(String),
    FieldInactive(String),
    TeamMismatch(String),
    TeamRequired,
    DivisionMismatch {
        expected: String,
        actual: String,
    },
    Forbidden(String),
    NotFound(String),
    NotOpen(SlotStatus),
    SelfClaim,
    Cancelled,
    DoubleBooking(Vec<SlotConflict>),
    Conflict(String),
    LimitExceeded(&'static str),
    /// The row's version tag moved since it was read.
    PreconditionFailed {
        key: RowKey,
        expected: VersionTag,
        actual: VersionTag,
    },
    AlreadyExists(RowKey),
    WalError(String),
    Directory(String),
}

impl EngineError {
    /// Machine-readable code for the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "VALIDATION",
            EngineError::FieldNotFound(_) => "FIELD_NOT_FOUND",
            EngineError::FieldInactive(_) => "FIELD_INACTIVE",
            EngineError::TeamMismatch(_) => "TEAM_MISMATCH",
            EngineError::TeamRequired => "TEAM_REQUIRED",
            EngineError::DivisionMismatch { .. } => "DIVISION_MISMATCH",
            EngineError::Forbidden(_) => "FORBIDDEN",
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::NotOpen(_) => "NOT_OPEN",
            EngineError::SelfClaim => "SELF_CLAIM",
            EngineError::Cancelled => "CANCELLED",
            EngineError::DoubleBooking(_) => "DOUBLE_BOOKING",
            EngineError::Conflict(_)
            | EngineError::PreconditionFailed { .. }
            | EngineError::AlreadyExists(_) => "CONFLICT",
            EngineError::LimitExceeded(_) => "LIMIT_EXCEEDED",
            EngineError::WalError(_) | EngineError::Directory(_) => "INTERNAL",
        }
    }

    /// Store or collaborator failure, as opposed to a business outcome.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, EngineError::WalError(_) | EngineError::Directory(_))
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "{msg}"),
            EngineError::FieldNotFound(key) => write!(f, "field not found: {key}"),
            EngineError::FieldInactive(key) => write!(f, "field is inactive: {key}"),
            EngineError::TeamMismatch(msg) => write!(f, "{msg}"),
            EngineError::TeamRequired => write!(f, "a team assignment is required"),
            EngineError::DivisionMismatch { expected, actual } => write!(
                f,
                "team is assigned to division {actual}, not {expected}"
            ),
            EngineError::Forbidden(msg) => write!(f, "{msg}"),
            EngineError::NotFound(what) => write!(f, "not found: {what}"),
            EngineError::NotOpen(status) => {
                write!(f, "slot is not open (status {})", status.as_str())
            }
            EngineError::SelfClaim => write!(f, "a team cannot claim its own slot"),
            EngineError::Cancelled => write!(f, "slot is cancelled"),
            EngineError::DoubleBooking(conflicts) => {
                write!(f, "double booking:")?;
                for c in conflicts {
                    write!(
                        f,
                        " team {} already plays {} {}-{} ({} slot {});",
                        c.team_id, c.game_date, c.start_time, c.end_time, c.division, c.slot_id
                    )?;
                }
                Ok(())
            }
            EngineError::Conflict(msg) => write!(f, "{msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::PreconditionFailed {
                key,
                expected,
                actual,
            } => write!(
                f,
                "precondition failed on {}/{}: expected {expected}, found {actual}",
                key.partition, key.row
            ),
            EngineError::AlreadyExists(key) => {
                write!(f, "already exists: {}/{}", key.partition, key.row)
            }
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
            EngineError::Directory(e) => write!(f, "field directory error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<TimeError> for EngineError {
    fn from(e: TimeError) -> Self {
        EngineError::Validation(e.to_string())
    }
}
