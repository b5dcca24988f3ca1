use std::{path::Path, time::Duration};

use crate::core::{domain::RunOutput, errors::RunError, traits::runner::Runner};

#[derive(Debug, Clone)]
pub struct RunnerStub {
    result: Result<RunOutput, RunError>,
    delay: Duration,
}

impl RunnerStub {
    pub fn new(result: Result<RunOutput, RunError>, delay: Duration) -> Self {
        Self { result, delay }
    }
}

#[async_trait::async_trait]
impl Runner for RunnerStub {
    #[tracing::instrument(skip(self, stdin))]
    async fn run(
        &self,
        executable: &Path,
        stdin: &[u8],
        timeout: Duration,
    ) -> Result<RunOutput, RunError> {
        tracing::debug!(
            "Start execution: executable={}, stdin_len={}, timeout={:?}",
            executable.display(),
            stdin.len(),
            timeout
        );
        tokio::time::sleep(self.delay).await;
        tracing::debug!("Execution result: {:?}", self.result);

        self.result.clone()
    }
}
