use std::time::Duration;

pub const DEFAULT_POOL_SIZE: usize = 10;
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(1);

pub const DEFAULT_GCC_PATH: &str = "gcc";
pub const DEFAULT_GXX_PATH: &str = "g++";

pub const SOURCE_FILE_PREFIX: &str = "user_code_";
