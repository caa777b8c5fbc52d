use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotInitialized,
    NoActivePlan,
    PlanNotFound,
    TaskNotFound,
    AmbiguousRef,
    CycleDetected,
    IllegalTransition,
    CrossPlanDependency,
    PlanNameConflict,
    AlreadyAccepted,
    BlockedBootstrap,
    LeaseMismatch,
    MissingEvidence,
    MissingTestPair,
    MissingEntropyProof,
    MissingConfidenceProof,
    InsufficientConfidence,
    UnauthorizedAuto,
    ValidationError,
    StoreError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::NoActivePlan => "NO_ACTIVE_PLAN",
            Self::PlanNotFound => "PLAN_NOT_FOUND",
            Self::TaskNotFound => "TASK_NOT_FOUND",
            Self::AmbiguousRef => "AMBIGUOUS_REF",
            Self::CycleDetected => "CYCLE_DETECTED",
            Self::IllegalTransition => "ILLEGAL_TRANSITION",
            Self::CrossPlanDependency => "CROSS_PLAN_DEPENDENCY",
            Self::PlanNameConflict => "PLAN_NAME_CONFLICT",
            Self::AlreadyAccepted => "ALREADY_ACCEPTED",
            Self::BlockedBootstrap => "BLOCKED_BOOTSTRAP",
            Self::LeaseMismatch => "LEASE_MISMATCH",
            Self::MissingEvidence => "MISSING_EVIDENCE",
            Self::MissingTestPair => "MISSING_TEST_PAIR",
            Self::MissingEntropyProof => "MISSING_ENTROPY_PROOF",
            Self::MissingConfidenceProof => "MISSING_CONFIDENCE_PROOF",
            Self::InsufficientConfidence => "INSUFFICIENT_CONFIDENCE",
            Self::UnauthorizedAuto => "UNAUTHORIZED_AUTO",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::StoreError => "DATABASE_ERROR",
        }
    }
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct BrokerError {
    pub code: ErrorCode,
    pub message: String,
}

impl BrokerError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_initialized() -> Self {
        Self::new(
            ErrorCode::NotInitialized,
            "taskbroker is not initialized. Run `taskbroker init` first.",
        )
    }

    pub fn no_active_plan() -> Self {
        Self::new(
            ErrorCode::NoActivePlan,
            "No active plan. Use `taskbroker plan activate <name>` or `--plan <name>`.",
        )
    }

    pub fn plan_not_found(reference: &str) -> Self {
        Self::new(ErrorCode::PlanNotFound, format!("Plan not found: {reference}"))
    }

    pub fn task_not_found(reference: &str) -> Self {
        Self::new(ErrorCode::TaskNotFound, format!("Task not found: {reference}"))
    }

    pub fn ambiguous_ref(reference: &str, candidates: &[String]) -> Self {
        Self::new(
            ErrorCode::AmbiguousRef,
            format!("Ambiguous reference '{}'. Candidates: {}", reference, candidates.join(", ")),
        )
    }

    pub fn cycle_detected() -> Self {
        Self::new(ErrorCode::CycleDetected, "Dependency cycle detected")
    }

    pub fn illegal_transition(from: &str, action: &str) -> Self {
        Self::new(
            ErrorCode::IllegalTransition,
            format!("Illegal transition: {from} --{action}--> (disallowed)"),
        )
    }

    pub fn cross_plan_dependency() -> Self {
        Self::new(
            ErrorCode::CrossPlanDependency,
            "Dependencies across different plans are not allowed",
        )
    }

    pub fn plan_name_conflict(name: &str) -> Self {
        Self::new(ErrorCode::PlanNameConflict, format!("Plan with name '{name}' already exists"))
    }

    pub fn lease_mismatch(task_id: &str) -> Self {
        Self::new(ErrorCode::LeaseMismatch, format!("Lease mismatch for task {task_id}"))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StoreError, message)
    }
}

impl From<rusqlite::Error> for BrokerError {
    fn from(e: rusqlite::Error) -> Self {
        Self::database(e.to_string())
    }
}

impl From<std::io::Error> for BrokerError {
    fn from(e: std::io::Error) -> Self {
        Self::validation(e.to_string())
    }
}
