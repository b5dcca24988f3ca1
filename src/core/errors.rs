use std::time::Duration;

#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    #[error("Compilation failed:\n{diagnostics}")]
    CompilationFailed { diagnostics: String },
    #[error("Compilation exceeded {limit_ms} ms")]
    TimedOut { limit_ms: u64 },
    #[error("Internal compiler error: {msg}")]
    Internal { msg: String },
}

impl CompileError {
    /// Toolchain diagnostics, present only when the submitted code is at fault.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            CompileError::CompilationFailed { diagnostics } => Some(diagnostics),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RunError {
    #[error("Execution exceeded {timeout_ms} ms")]
    TimedOut { timeout_ms: u64 },
    #[error("Runtime error ({exit}): {stderr}")]
    RuntimeError { exit: String, stderr: String },
    #[error("Failed to launch executable: {msg}")]
    Launch { msg: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("Execution pool is saturated")]
    Saturated,
    #[error("Timed out after {0:?} waiting for a free execution slot")]
    AdmissionTimeout(Duration),
    #[error("Execution pool is shut down")]
    Closed,
    #[error("Worker dropped the task without reporting a result")]
    WorkerLost,
    #[error("Execution pool size must be greater than zero")]
    InvalidSize,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum JudgeError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("Could not submit task to the execution pool: {0}")]
    PoolSubmission(#[from] PoolError),
    #[error("Time limit of {timeout_ms} ms exceeded")]
    Timeout { timeout_ms: u64 },
    #[error("Runtime error ({exit}): {stderr}")]
    Runtime { exit: String, stderr: String },
    #[error("Execution timeout must be greater than zero")]
    InvalidTimeout,
}

impl JudgeError {
    /// Whether the error is a verdict on the submission rather than a fault
    /// of the judging system.
    pub fn is_judging_outcome(&self) -> bool {
        match self {
            JudgeError::Compile(e) => e.diagnostics().is_some(),
            JudgeError::Timeout { .. } | JudgeError::Runtime { .. } => true,
            JudgeError::PoolSubmission(_) | JudgeError::InvalidTimeout => false,
        }
    }
}

impl From<RunError> for JudgeError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::TimedOut { timeout_ms } => JudgeError::Timeout { timeout_ms },
            RunError::RuntimeError { exit, stderr } => JudgeError::Runtime { exit, stderr },
            // A missing or non-executable artifact surfaces at run time.
            RunError::Launch { msg } => JudgeError::Runtime {
                exit: "failed to launch".to_string(),
                stderr: msg,
            },
        }
    }
}
