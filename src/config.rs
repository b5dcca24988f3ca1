use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    constants::{DEFAULT_GCC_PATH, DEFAULT_GXX_PATH, DEFAULT_POOL_SIZE, DEFAULT_RUN_TIMEOUT},
    core::{
        domain::CompilationLimits,
        pool::{AdmissionPolicy, PoolConfig},
    },
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("Temporary directory {path} is unusable: {source}")]
    TempDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JudgeConfig {
    pub pool: PoolConfig,
    pub run_timeout: Duration,
    pub compilation_limits: CompilationLimits,
    pub gcc_path: PathBuf,
    pub gxx_path: PathBuf,
    pub temp_dir: PathBuf,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            run_timeout: DEFAULT_RUN_TIMEOUT,
            compilation_limits: CompilationLimits::default(),
            gcc_path: DEFAULT_GCC_PATH.into(),
            gxx_path: DEFAULT_GXX_PATH.into(),
            temp_dir: std::env::temp_dir(),
        }
    }
}

fn parse<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            reason: e.to_string(),
            value,
        })
}

fn positive(key: &'static str, value: String) -> Result<u64, ConfigError> {
    match parse::<u64>(key, value.clone())? {
        0 => Err(ConfigError::InvalidValue {
            key,
            value,
            reason: "must be greater than zero".to_string(),
        }),
        n => Ok(n),
    }
}

impl JudgeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from defaults overridden by `lookup`.
    ///
    /// Recognised keys: `JUDGE_POOL_SIZE`, `JUDGE_QUEUE_CAPACITY`,
    /// `JUDGE_RUN_TIMEOUT_MS`, `JUDGE_COMPILE_TIMEOUT_MS`, `JUDGE_ADMISSION`,
    /// `JUDGE_GCC_PATH`, `JUDGE_GXX_PATH`, `JUDGE_TEMP_DIR`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("JUDGE_POOL_SIZE") {
            config.pool.size = positive("JUDGE_POOL_SIZE", value)? as usize;
            config.pool.queue_capacity = config.pool.size;
        }
        if let Some(value) = lookup("JUDGE_QUEUE_CAPACITY") {
            config.pool.queue_capacity = positive("JUDGE_QUEUE_CAPACITY", value)? as usize;
        }
        if let Some(value) = lookup("JUDGE_ADMISSION") {
            config.pool.admission = parse::<AdmissionPolicy>("JUDGE_ADMISSION", value)?;
        }
        if let Some(value) = lookup("JUDGE_RUN_TIMEOUT_MS") {
            config.run_timeout = Duration::from_millis(positive("JUDGE_RUN_TIMEOUT_MS", value)?);
        }
        if let Some(value) = lookup("JUDGE_COMPILE_TIMEOUT_MS") {
            config.compilation_limits.time_ms = Some(positive("JUDGE_COMPILE_TIMEOUT_MS", value)?);
        }
        if let Some(value) = lookup("JUDGE_GCC_PATH") {
            config.gcc_path = value.into();
        }
        if let Some(value) = lookup("JUDGE_GXX_PATH") {
            config.gxx_path = value.into();
        }
        if let Some(value) = lookup("JUDGE_TEMP_DIR") {
            config.temp_dir = value.into();
        }

        Ok(config)
    }

    /// Checks that the temporary directory can hold sources and artifacts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_temp_dir(&self.temp_dir)
    }
}

fn check_temp_dir(dir: &Path) -> Result<(), ConfigError> {
    let to_err = |source| ConfigError::TempDir {
        path: dir.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(dir).map_err(to_err)?;
    tempfile::tempfile_in(dir).map_err(to_err)?;
    Ok(())
}
