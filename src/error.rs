use thiserror::Error;

use crate::job::JobId;

#[derive(Error, Debug)]
pub enum JobForgeError {
    #[error("Job not found: {id}")]
    JobNotFound { id: JobId },

    #[error("Job {id} is not cancelable")]
    JobNotCancelable { id: JobId },

    #[error("Job {id} has no body attached")]
    BodyMissing { id: JobId },

    #[error("Store error: {message}")]
    Store { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Manager error: {message}")]
    Manager { message: String },

    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
