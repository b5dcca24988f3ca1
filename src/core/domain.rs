use std::{borrow::Cow, fmt, path::PathBuf, str::FromStr, time::Duration};

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::core::errors::{JudgeError, RunError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Language {
    C,
    Cpp,
}

impl Language {
    pub fn source_extension(&self) -> &'static str {
        match self {
            Language::C => ".c",
            Language::Cpp => ".cpp",
        }
    }

    pub fn artifact_prefix(&self) -> &'static str {
        match self {
            Language::C => "c_out_",
            Language::Cpp => "cpp_out_",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::C => write!(f, "c"),
            Language::Cpp => write!(f, "cpp"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unsupported language: {0}")]
pub struct UnsupportedLanguage(pub String);

impl FromStr for Language {
    type Err = UnsupportedLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "c" => Ok(Language::C),
            "cpp" | "c++" | "cxx" => Ok(Language::Cpp),
            other => Err(UnsupportedLanguage(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompilationLimits {
    /// Wall-clock limit for the compiler process. `None` means unbounded.
    pub time_ms: Option<u64>,
}

/// Captured result of a run that exited with status zero.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub execution_time_ms: u64,
}

impl RunOutput {
    pub fn stdout_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }
}

/// One request to run an artifact against one input under one timeout.
///
/// The task owns the sending half of its completion channel, so whichever
/// worker consumes it is the only one able to report a result.
#[derive(Debug)]
pub struct ExecutionTask {
    pub id: Uuid,
    pub executable_path: PathBuf,
    pub input: Vec<u8>,
    pub timeout: Duration,
    done: oneshot::Sender<Result<RunOutput, RunError>>,
}

pub type TaskCompletion = oneshot::Receiver<Result<RunOutput, RunError>>;

impl ExecutionTask {
    pub fn new(
        executable_path: PathBuf,
        input: Vec<u8>,
        timeout: Duration,
    ) -> (Self, TaskCompletion) {
        let (done, completion) = oneshot::channel();
        let task = Self {
            id: Uuid::new_v4(),
            executable_path,
            input,
            timeout,
            done,
        };
        (task, completion)
    }

    /// Consumes the task and signals its submitter.
    ///
    /// Returns `false` when the submitter is no longer waiting.
    pub fn complete(self, result: Result<RunOutput, RunError>) -> bool {
        self.done.send(result).is_ok()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
}

impl TestCase {
    pub fn new(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: expected_output.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    WrongAnswer { expected: String, actual: String },
    TimeLimitExceeded,
    RuntimeError { exit: String, stderr: String },
    CompilationError { diagnostics: String },
    InternalError { msg: String },
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Verdict::Accepted => "AC",
            Verdict::WrongAnswer { .. } => "WA",
            Verdict::TimeLimitExceeded => "TLE",
            Verdict::RuntimeError { .. } => "RE",
            Verdict::CompilationError { .. } => "CE",
            Verdict::InternalError { .. } => "IE",
        }
    }

    /// Compares captured output against the expected answer byte for byte.
    pub fn from_output(expected: &str, output: &RunOutput) -> Self {
        if output.stdout == expected.as_bytes() {
            Verdict::Accepted
        } else {
            Verdict::WrongAnswer {
                expected: expected.to_string(),
                actual: output.stdout_text().into_owned(),
            }
        }
    }
}

impl From<&JudgeError> for Verdict {
    fn from(err: &JudgeError) -> Self {
        match err {
            JudgeError::Timeout { .. } => Verdict::TimeLimitExceeded,
            JudgeError::Runtime { exit, stderr } => Verdict::RuntimeError {
                exit: exit.clone(),
                stderr: stderr.clone(),
            },
            JudgeError::Compile(e) => match e.diagnostics() {
                Some(diagnostics) => Verdict::CompilationError {
                    diagnostics: diagnostics.to_string(),
                },
                None => Verdict::InternalError { msg: e.to_string() },
            },
            JudgeError::PoolSubmission(_) | JudgeError::InvalidTimeout => {
                Verdict::InternalError {
                    msg: err.to_string(),
                }
            }
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Accepted => write!(f, "Accepted"),
            Verdict::WrongAnswer { .. } => write!(f, "Wrong Answer"),
            Verdict::TimeLimitExceeded => write!(f, "Time Limit Exceeded"),
            Verdict::RuntimeError { exit, .. } => write!(f, "Runtime Error ({})", exit),
            Verdict::CompilationError { .. } => write!(f, "Compilation Error"),
            Verdict::InternalError { msg } => write!(f, "Internal Error: {}", msg),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestVerdict {
    pub index: usize,
    pub verdict: Verdict,
    pub execution_time_ms: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct JudgeReport {
    pub id: Uuid,
    pub language: Language,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
    pub compilation: Option<Verdict>,
    pub tests: Vec<TestVerdict>,
}

impl JudgeReport {
    /// First non-accepted verdict, compilation included.
    pub fn overall(&self) -> Verdict {
        if let Some(verdict) = &self.compilation {
            return verdict.clone();
        }
        self.tests
            .iter()
            .map(|t| &t.verdict)
            .find(|v| !v.is_accepted())
            .cloned()
            .unwrap_or(Verdict::Accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::CompileError;

    fn output(stdout: &str) -> RunOutput {
        RunOutput {
            stdout: stdout.as_bytes().to_vec(),
            stderr: Vec::new(),
            execution_time_ms: 3,
        }
    }

    #[test]
    fn test_language_parsing() {
        assert_eq!("c".parse::<Language>().unwrap(), Language::C);
        assert_eq!("C++".parse::<Language>().unwrap(), Language::Cpp);
        assert_eq!(" cpp ".parse::<Language>().unwrap(), Language::Cpp);
        assert!("java".parse::<Language>().is_err());
    }

    #[test]
    fn test_language_file_naming() {
        assert_eq!(Language::C.source_extension(), ".c");
        assert_eq!(Language::Cpp.source_extension(), ".cpp");
        assert_eq!(Language::C.artifact_prefix(), "c_out_");
        assert_eq!(Language::Cpp.artifact_prefix(), "cpp_out_");
    }

    #[test]
    fn test_verdict_comparison_is_exact() {
        assert_eq!(Verdict::from_output("5\n", &output("5\n")), Verdict::Accepted);

        // Trailing whitespace is not normalised away.
        assert!(matches!(
            Verdict::from_output("5", &output("5\n")),
            Verdict::WrongAnswer { .. }
        ));
    }

    #[test]
    fn test_verdict_from_judge_error() {
        assert_eq!(
            Verdict::from(&JudgeError::Timeout { timeout_ms: 1000 }),
            Verdict::TimeLimitExceeded
        );
        assert!(matches!(
            Verdict::from(&JudgeError::Compile(CompileError::CompilationFailed {
                diagnostics: "expected ';'".to_string()
            })),
            Verdict::CompilationError { .. }
        ));
        assert!(matches!(
            Verdict::from(&JudgeError::Compile(CompileError::Internal {
                msg: "disk full".to_string()
            })),
            Verdict::InternalError { .. }
        ));
    }

    #[tokio::test]
    async fn test_task_completion_is_delivered_once() {
        let (task, completion) =
            ExecutionTask::new(PathBuf::from("/bin/true"), Vec::new(), Duration::from_secs(1));

        assert!(task.complete(Ok(output("hi"))));
        let result = completion.await.unwrap();
        assert_eq!(result.unwrap().stdout, b"hi");
    }

    #[tokio::test]
    async fn test_task_completion_without_submitter() {
        let (task, completion) =
            ExecutionTask::new(PathBuf::from("/bin/true"), Vec::new(), Duration::from_secs(1));
        drop(completion);

        assert!(!task.complete(Ok(output(""))));
    }

    #[test]
    fn test_report_overall_verdict() {
        let report = JudgeReport {
            id: Uuid::new_v4(),
            language: Language::Cpp,
            started_at: chrono::Utc::now(),
            finished_at: chrono::Utc::now(),
            compilation: None,
            tests: vec![
                TestVerdict {
                    index: 0,
                    verdict: Verdict::Accepted,
                    execution_time_ms: Some(1),
                },
                TestVerdict {
                    index: 1,
                    verdict: Verdict::TimeLimitExceeded,
                    execution_time_ms: None,
                },
            ],
        };

        assert_eq!(report.overall(), Verdict::TimeLimitExceeded);
    }
}
