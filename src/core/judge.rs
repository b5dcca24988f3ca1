use std::{path::Path, sync::Arc, time::Duration};

use futures::stream::FuturesUnordered;
use itertools::Itertools;
use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::core::{
    artifact::Artifact,
    domain::{
        CompilationLimits, JudgeReport, Language, RunOutput, TestCase, TestVerdict, Verdict,
    },
    errors::{CompileError, JudgeError},
    pool::ExecutionPool,
    traits::compiler::Compiler,
};

/// Entry point composing a [`Compiler`] with an [`ExecutionPool`].
///
/// Every call is independent: nothing is retried, cached or deduplicated.
#[derive(Clone, Debug)]
pub struct Judge {
    compiler: Arc<dyn Compiler>,
    pool: Arc<ExecutionPool>,
    run_timeout: Duration,
    compilation_limits: CompilationLimits,
}

impl Judge {
    pub fn new(
        compiler: Arc<dyn Compiler>,
        pool: Arc<ExecutionPool>,
        run_timeout: Duration,
        compilation_limits: CompilationLimits,
    ) -> Self {
        Self {
            compiler,
            pool,
            run_timeout,
            compilation_limits,
        }
    }

    pub fn pool(&self) -> &Arc<ExecutionPool> {
        &self.pool
    }

    pub fn run_timeout(&self) -> Duration {
        self.run_timeout
    }

    #[tracing::instrument(skip(self, source))]
    pub async fn compile(
        &self,
        language: Language,
        source: &[u8],
    ) -> Result<Artifact, CompileError> {
        let result = self
            .compiler
            .compile(source, &language, &self.compilation_limits)
            .await;
        match &result {
            Ok(artifact) => tracing::debug!("Compiled artifact {}", artifact.id()),
            Err(e) => tracing::debug!("Compilation result: {}", e),
        }
        result
    }

    /// Runs `executable` once against `input` with the configured timeout.
    pub async fn submit_judge(
        &self,
        executable: impl AsRef<Path>,
        input: impl Into<Vec<u8>>,
    ) -> Result<RunOutput, JudgeError> {
        self.submit_judge_with_timeout(executable, input, self.run_timeout)
            .await
    }

    pub async fn submit_judge_with_timeout(
        &self,
        executable: impl AsRef<Path>,
        input: impl Into<Vec<u8>>,
        timeout: Duration,
    ) -> Result<RunOutput, JudgeError> {
        if timeout.is_zero() {
            return Err(JudgeError::InvalidTimeout);
        }
        self.pool
            .run(executable.as_ref().to_path_buf(), input.into(), timeout)
            .await
    }

    /// Runs every case against `executable` concurrently through the pool.
    ///
    /// Verdicts are returned in case order.
    pub async fn judge_cases(
        &self,
        executable: impl AsRef<Path>,
        cases: &[TestCase],
    ) -> Vec<TestVerdict> {
        let executable = executable.as_ref();
        let mut futures: FuturesUnordered<_> = cases
            .iter()
            .enumerate()
            .map(|(index, case)| async move {
                let result = self.submit_judge(executable, case.input.as_bytes()).await;
                (index, case, result)
            })
            .collect();

        let mut verdicts = Vec::with_capacity(cases.len());
        while let Some((index, case, result)) = futures.next().await {
            let verdict = match result {
                Ok(output) => TestVerdict {
                    index,
                    verdict: Verdict::from_output(&case.expected_output, &output),
                    execution_time_ms: Some(output.execution_time_ms),
                },
                Err(e) => {
                    if !e.is_judging_outcome() {
                        tracing::error!("Internal error on case {}: {}", index, e);
                    }
                    TestVerdict {
                        index,
                        verdict: Verdict::from(&e),
                        execution_time_ms: None,
                    }
                }
            };
            tracing::debug!("Case {}: {}", index, verdict.verdict);
            verdicts.push(verdict);
        }

        verdicts.into_iter().sorted_by_key(|v| v.index).collect()
    }

    /// Compiles `source`, judges it against `cases` and removes the artifact.
    #[tracing::instrument(skip(self, source, cases), fields(cases = cases.len()))]
    pub async fn judge_source(
        &self,
        language: Language,
        source: &[u8],
        cases: &[TestCase],
    ) -> JudgeReport {
        let id = Uuid::new_v4();
        let started_at = chrono::Utc::now();

        let (compilation, tests) = match self.compile(language, source).await {
            Ok(artifact) => {
                let tests = self.judge_cases(&artifact, cases).await;
                (None, tests)
            }
            Err(e) => {
                let verdict = Verdict::from(&JudgeError::from(e));
                (Some(verdict), Vec::new())
            }
        };

        let report = JudgeReport {
            id,
            language,
            started_at,
            finished_at: chrono::Utc::now(),
            compilation,
            tests,
        };
        tracing::info!("Submission {} judged: {}", report.id, report.overall());
        report
    }
}
