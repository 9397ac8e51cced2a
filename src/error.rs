#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Calendar access is not supported on this platform")]
    Unsupported,

    #[error("Calendar permission denied")]
    PermissionDenied,

    #[error("No writable calendar available: {0}")]
    NoWritableCalendar(String),

    #[error("Calendar event not found: {0}")]
    EventNotFound(String),

    #[error("Calendar provider error: {0}")]
    Provider(String),

    #[error("Health provider error: {0}")]
    Health(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Short machine-readable code, used as a structured field in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unsupported => "UNSUPPORTED",
            AppError::PermissionDenied => "PERMISSION_DENIED",
            AppError::NoWritableCalendar(_) => "NO_WRITABLE_CALENDAR",
            AppError::EventNotFound(_) => "EVENT_NOT_FOUND",
            AppError::Provider(_) => "PROVIDER_ERROR",
            AppError::Health(_) => "HEALTH_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Whether the error means the calendar cannot be used at all for this call
    /// (as opposed to a failure on a single item).
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            AppError::Unsupported | AppError::PermissionDenied | AppError::NoWritableCalendar(_)
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;
