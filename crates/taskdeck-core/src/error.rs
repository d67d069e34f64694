use crate::category::CategoryId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Task title is required")]
    TitleRequired,
    #[error("Task title must be at least {min} characters")]
    TitleTooShort { min: usize },
    #[error("Description must be less than {max} characters (got {len})")]
    DescriptionTooLong { max: usize, len: usize },
    #[error("unknown category: {0}")]
    UnknownCategory(CategoryId),
    #[error("no task ids left to allocate")]
    TaskIdsExhausted,
    #[error("Category name is required")]
    CategoryNameRequired,
    #[error("invalid id: {0}")]
    InvalidId(String),
    #[error("invalid priority: {0} (expected low, medium or high)")]
    InvalidPriority(String),
    #[error("invalid category filter: {0} (expected all or a category id)")]
    InvalidCategoryFilter(String),
    #[error("invalid status filter: {0} (expected all, pending or completed)")]
    InvalidStatusFilter(String),
}

/// Failures of the remote seed fetch. These never reach store callers; the
/// task store folds them into its error flag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Please enter both email and password")]
    MissingCredentials,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("login required")]
    NotAuthenticated,
}
