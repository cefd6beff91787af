use std::net::SocketAddr;

use crate::engine::EngineError;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: assignments persisted (single and whole-period).
pub const ASSIGNMENTS_CREATED_TOTAL: &str = "rota_assignments_created_total";

/// Counter: assignments removed by the obstacle-approval or task-deletion
/// cascade. Labels: cause.
pub const ASSIGNMENTS_REVOKED_TOTAL: &str = "rota_assignments_revoked_total";

/// Counter: assignment requests rejected by the validation pipeline.
/// Labels: reason.
pub const ASSIGNMENT_REJECTIONS_TOTAL: &str = "rota_assignment_rejections_total";

/// Counter: obstacles created.
pub const OBSTACLES_CREATED_TOTAL: &str = "rota_obstacles_created_total";

/// Counter: obstacles leaving Pending. Labels: status.
pub const OBSTACLES_RESOLVED_TOTAL: &str = "rota_obstacles_resolved_total";

// ── USE metrics (resource-driven) ───────────────────────────────

/// Counter: per-user session expirations broadcast on role deletion.
pub const SESSIONS_EXPIRED_TOTAL: &str = "rota_sessions_expired_total";

/// Install the fmt tracing subscriber. Call once from the host process.
pub fn init_tracing() {
    tracing_subscriber::fmt::init();
}

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init_metrics(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Map an engine rejection to a short label for metrics.
pub fn error_label(err: &EngineError) -> &'static str {
    match err {
        EngineError::NotFound(..) => "not_found",
        EngineError::AlreadyExists(..) => "already_exists",
        EngineError::ScheduleInConflict => "schedule_in_conflict",
        EngineError::RoleRequirementsNotMet => "role_requirements_not_met",
        EngineError::SensitiveEntityProtected(_) => "sensitive_entity",
        EngineError::SameTasksForConflict => "same_tasks",
        EngineError::InvalidDateRange { .. } => "invalid_date_range",
        EngineError::InvalidArgument(_) => "invalid_argument",
        EngineError::Forbidden(_) => "forbidden",
        EngineError::LimitExceeded(_) => "limit_exceeded",
    }
}
