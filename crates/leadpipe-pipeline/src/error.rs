use leadpipe_core::PlanError;
use leadpipe_db::DbError;
use leadpipe_providers::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A credential or setting the operation needs is missing.
    #[error("configuration error: {0}")]
    Config(String),

    /// The caller sent something unusable.
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Upstream(#[from] ProviderError),

    #[error(transparent)]
    Db(DbError),
}

impl PipelineError {
    /// Stable machine-readable code surfaced by the API.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Config(_) => "config_error",
            PipelineError::Validation(_) => "validation_error",
            PipelineError::NotFound(_) => "not_found",
            PipelineError::Upstream(_) => "upstream_error",
            PipelineError::Db(_) => "internal_error",
        }
    }
}

impl From<DbError> for PipelineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => PipelineError::NotFound("record".to_string()),
            other => PipelineError::Db(other),
        }
    }
}

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        PipelineError::Db(DbError::Sqlx(err))
    }
}

impl From<PlanError> for PipelineError {
    fn from(err: PlanError) -> Self {
        PipelineError::Validation(err.to_string())
    }
}
