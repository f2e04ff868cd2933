use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("failed to launch subprocess for task {task_id}: {source}")]
    SubprocessLaunchFailed {
        task_id: String,
        #[source]
        source: std::io::Error,
    },

    /// Detected via the subprocess exiting immediately with hashcat's
    /// "already running" diagnostic. Bounded-retried by the Job Manager.
    #[error("subprocess for task {0} reported it is already running")]
    AlreadyRunning(String),

    #[error("subprocess for task {task_id} crashed: exit {exit_code:?}: {message}")]
    SubprocessCrashed {
        task_id: String,
        exit_code: Option<i32>,
        message: String,
    },

    #[error("no active task with id {0}")]
    NotFound(String),

    #[error("task {0} is already active")]
    AlreadyActive(String),
}
