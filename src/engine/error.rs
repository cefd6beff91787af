use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    User,
    Role,
    Task,
    Assignment,
    Obstacle,
    Conflict,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntityKind::User => "user",
            EntityKind::Role => "role",
            EntityKind::Task => "task",
            EntityKind::Assignment => "assignment",
            EntityKind::Obstacle => "obstacle",
            EntityKind::Conflict => "conflict",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub enum EngineError {
    NotFound(EntityKind, String),
    AlreadyExists(EntityKind, String),
    ScheduleInConflict,
    RoleRequirementsNotMet,
    SensitiveEntityProtected(String),
    SameTasksForConflict,
    InvalidDateRange { from: NaiveDate, to: NaiveDate },
    InvalidArgument(String),
    Forbidden(&'static str),
    LimitExceeded(&'static str),
}

impl EngineError {
    /// HTTP-equivalent status for hosts exposing the engine over a transport.
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::NotFound(..) => 404,
            EngineError::AlreadyExists(..)
            | EngineError::ScheduleInConflict
            | EngineError::SameTasksForConflict
            | EngineError::SensitiveEntityProtected(_) => 409,
            EngineError::RoleRequirementsNotMet
            | EngineError::InvalidDateRange { .. }
            | EngineError::InvalidArgument(_)
            | EngineError::LimitExceeded(_) => 400,
            EngineError::Forbidden(_) => 403,
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(kind, key) => write!(f, "{kind} not found: {key}"),
            EngineError::AlreadyExists(kind, key) => write!(f, "{kind} already exists: {key}"),
            EngineError::ScheduleInConflict => {
                write!(f, "assignment is in conflict with the user's other assignments")
            }
            EngineError::RoleRequirementsNotMet => {
                write!(f, "user does not hold any role allowed for the task")
            }
            EngineError::SensitiveEntityProtected(name) => {
                write!(f, "entity is protected and cannot be changed: {name}")
            }
            EngineError::SameTasksForConflict => {
                write!(f, "a conflict requires two distinct tasks")
            }
            EngineError::InvalidDateRange { from, to } => {
                write!(f, "invalid date range: {from} is after {to}")
            }
            EngineError::InvalidArgument(reason) => write!(f, "invalid argument: {reason}"),
            EngineError::Forbidden(action) => write!(f, "forbidden: {action}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}
