use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use uuid::Uuid;

use crate::core::{
    artifact::Artifact,
    domain::{CompilationLimits, Language},
    errors::CompileError,
    traits::compiler::Compiler,
};

/// Produces an empty placeholder file in `dir` as the artifact on success.
#[derive(Debug, Clone)]
pub struct CompilerStub {
    result: Result<(), CompileError>,
    delay: Duration,
    dir: PathBuf,
}

impl CompilerStub {
    pub fn new<P: AsRef<Path>>(result: Result<(), CompileError>, delay: Duration, dir: P) -> Self {
        Self {
            result,
            delay,
            dir: dir.as_ref().into(),
        }
    }
}

#[async_trait::async_trait]
impl Compiler for CompilerStub {
    #[tracing::instrument(skip(self, source))]
    async fn compile(
        &self,
        source: &[u8],
        language: &Language,
        limits: &CompilationLimits,
    ) -> Result<Artifact, CompileError> {
        tracing::debug!(
            "Start compilation: source_len={}, language={}, limits={:?}",
            source.len(),
            language,
            limits
        );
        tokio::time::sleep(self.delay).await;
        tracing::debug!("Compilation result: {:?}", self.result);

        self.result.clone()?;

        let id = Uuid::new_v4();
        let path = Artifact::path_for(&self.dir, *language, id);
        tokio::fs::write(&path, b"")
            .await
            .map_err(|e| CompileError::Internal { msg: e.to_string() })?;
        Ok(Artifact::new(id, *language, path))
    }
}
