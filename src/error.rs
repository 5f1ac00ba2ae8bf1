use thiserror::Error;

#[derive(Error, Debug)]
pub enum PubupError {
    #[error("Project validation failed: {0}")]
    ProjectValidation(String),

    #[error("No pubspec.yaml manifest found in the project")]
    MissingManifest,

    #[error("Update ran to completion but no file content changed")]
    NoChanges,

    #[error("Updater produced no changes for '{manifest}' although the pair was selected for update")]
    StaleUpdate { manifest: String },

    #[error("`{command}` exited with status {status}: {stderr}")]
    SubprocessFailure {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("`{command}` did not finish within {budget_secs}s")]
    SubprocessTimeout { command: String, budget_secs: u64 },

    #[error("Patch helper failed: {0}")]
    Helper(String),

    #[error("Git operation failed: {0}")]
    GitOperation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PubupError>;
