use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Db(#[from] sm_db::DbError),

    #[error(transparent)]
    Pipeline(#[from] sm_pipelines::PipelineError),

    #[error("job {0} not found")]
    JobNotFound(i64),

    #[error("planning failed: {0}")]
    PlanningFailed(String),

    #[error("job run cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, DaemonError>;
