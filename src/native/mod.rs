/// Native module contains implementations of core traits
/// that drive the host toolchain and plain child processes directly,
/// without containers or any other isolation layer.
pub mod compiler;
mod process;
pub mod runner;

use std::sync::Arc;

use crate::{
    config::{ConfigError, JudgeConfig},
    core::{errors::PoolError, judge::Judge, pool::ExecutionPool},
    native::{compiler::NativeCompiler, runner::NativeRunner},
};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to start execution pool: {0}")]
    Pool(#[from] PoolError),
}

/// Builds a [`Judge`] backed by the host toolchain.
///
/// Fails when the temporary directory is unusable or the pool cannot start;
/// both conditions should abort service startup. Must be called from within
/// a tokio runtime.
pub fn native_judge(config: &JudgeConfig) -> Result<Judge, StartupError> {
    config.validate()?;

    let compiler = NativeCompiler::new(&config.temp_dir, &config.gcc_path, &config.gxx_path);
    let pool = ExecutionPool::start(config.pool.clone(), Arc::new(NativeRunner::new()))?;

    Ok(Judge::new(
        Arc::new(compiler),
        Arc::new(pool),
        config.run_timeout,
        config.compilation_limits.clone(),
    ))
}
