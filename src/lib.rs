//! Compiles C/C++ submissions with the host toolchain and runs the resulting
//! executables on a bounded pool of workers under a wall-clock deadline.

pub mod config;
pub mod constants;
pub mod core;
pub mod native;
#[cfg(test)]
mod stubs;


pub use crate::config::{ConfigError, JudgeConfig};
pub use crate::core::{
    artifact::Artifact,
    domain::{JudgeReport, Language, RunOutput, TestCase, TestVerdict, Verdict},
    errors::{CompileError, JudgeError, PoolError, RunError},
    judge::Judge,
    pool::{AdmissionPolicy, ExecutionPool, PoolConfig},
};
pub use crate::native::{StartupError, native_judge};
