use crate::core::{
    artifact::Artifact,
    domain::{CompilationLimits, Language},
    errors::CompileError,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Compiler: std::fmt::Debug + Send + Sync {
    async fn compile(
        &self,
        source: &[u8],
        language: &Language,
        limits: &CompilationLimits,
    ) -> Result<Artifact, CompileError>;
}
