use std::{path::Path, time::Duration};

use crate::core::{domain::RunOutput, errors::RunError};

/// Runs one executable to completion under a wall-clock deadline.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Runner: std::fmt::Debug + Send + Sync {
    async fn run(
        &self,
        executable: &Path,
        stdin: &[u8],
        timeout: Duration,
    ) -> Result<RunOutput, RunError>;
}
