//! rota — a duty-roster engine.
//!
//! Binds people to recurring duties on calendar dates, subject to role
//! eligibility, approved-leave exclusion, and pairwise task conflicts.
//! Keeps role catalogs densely ordered under insertion and removal, and
//! drives the leave-request lifecycle whose approval retroactively revokes
//! overlapping assignments.
//!
//! The crate is transport-agnostic: it exposes an async [`engine::Engine`]
//! over an in-memory store plus the [`sessions::SessionInvalidator`] seam
//! for whatever session layer sits in front of it.

pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod sessions;

pub use engine::{Engine, EngineError, EntityKind, FUNCTIONAL_ROLE};
pub use engine::{NewObstacle, NewRole, NewTask, NewUser};
pub use model::{
    Assignment, ConflictPair, DateRange, Obstacle, ObstaclePatch, ObstacleStatus, Role, RoleKind,
    Task, User, UserTaskDependency,
};
pub use sessions::{SessionEvent, SessionHub, SessionInvalidator};
