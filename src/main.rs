use std::{
    panic,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing_subscriber::EnvFilter;

use compiled_judge::{AdmissionPolicy, JudgeConfig, JudgeError, Language, TestCase, native_judge};

#[derive(Parser)]
#[command(name = "compiled-judge")]
#[command(about = "Compile C/C++ submissions and run them under a time limit.", long_about = None)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Overrides {
    /// Number of worker slots.
    #[arg(long, global = true)]
    pool_size: Option<usize>,

    /// Execution time limit per run, in milliseconds.
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// `block`, `reject`, or how many milliseconds to wait for a free slot.
    #[arg(long, global = true)]
    admission: Option<AdmissionPolicy>,
}

#[derive(Subcommand)]
enum Command {
    /// Compile SOURCE and run it once, printing its standard output.
    Run {
        #[arg(long, default_value = "cpp")]
        lang: Language,

        source: PathBuf,

        /// Read standard input for the program from this file instead of stdin.
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,
    },
    /// Compile SOURCE and judge it against test cases.
    Judge {
        #[arg(long, default_value = "cpp")]
        lang: Language,

        source: PathBuf,

        /// Test case as `<input file>:<expected output file>`; repeatable.
        #[arg(long = "case", value_name = "IN:OUT", required = true)]
        cases: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    set_panic_hook();

    match try_main().await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn try_main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(&cli.overrides)?;
    let judge = native_judge(&config).context("judge startup failed")?;

    let code = match cli.command {
        Command::Run {
            lang,
            source,
            input,
        } => {
            let source = read(&source).await?;
            let input = match input {
                Some(path) => read(&path).await?,
                None => {
                    let mut buf = Vec::new();
                    tokio::io::stdin()
                        .read_to_end(&mut buf)
                        .await
                        .context("read stdin")?;
                    buf
                }
            };

            let artifact = match judge.compile(lang, &source).await {
                Ok(artifact) => artifact,
                Err(e) => {
                    eprintln!("{}", e);
                    return Ok(ExitCode::from(1));
                }
            };

            match judge.submit_judge(&artifact, input).await {
                Ok(output) => {
                    let mut stdout = tokio::io::stdout();
                    stdout.write_all(&output.stdout).await?;
                    stdout.flush().await?;
                    ExitCode::SUCCESS
                }
                Err(e @ JudgeError::PoolSubmission(_)) => return Err(e.into()),
                Err(e) => {
                    eprintln!("{}", e);
                    ExitCode::from(1)
                }
            }
        }
        Command::Judge {
            lang,
            source,
            cases,
        } => {
            let source = read(&source).await?;
            let mut test_cases = Vec::with_capacity(cases.len());
            for spec in &cases {
                test_cases.push(load_case(spec).await?);
            }

            let report = judge.judge_source(lang, &source, &test_cases).await;
            if let Some(verdict) = &report.compilation {
                println!("{}", verdict);
            }
            for test in &report.tests {
                println!(
                    "#{} {} {}",
                    test.index + 1,
                    test.verdict.short_name(),
                    test.execution_time_ms
                        .map(|ms| format!("{} ms", ms))
                        .unwrap_or_default()
                );
            }
            println!("{}", report.overall());

            if report.overall().is_accepted() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
    };

    judge.pool().shutdown().await;
    Ok(code)
}

fn load_config(overrides: &Overrides) -> Result<JudgeConfig> {
    let mut config = JudgeConfig::from_env().context("invalid environment configuration")?;
    if let Some(size) = overrides.pool_size {
        config.pool.size = size;
        config.pool.queue_capacity = config.pool.queue_capacity.max(size);
    }
    if let Some(ms) = overrides.timeout_ms {
        anyhow::ensure!(ms > 0, "--timeout-ms must be greater than zero");
        config.run_timeout = std::time::Duration::from_millis(ms);
    }
    if let Some(admission) = overrides.admission {
        config.pool.admission = admission;
    }
    tracing::debug!("Configuration: {:?}", config);
    Ok(config)
}

async fn read(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("read {}", path.display()))
}

/// Splits `IN:OUT` at the last colon, so the input path may itself contain one.
fn split_case(spec: &str) -> Result<(&str, &str)> {
    match spec.rsplit_once(':') {
        Some((input, expected)) if !input.is_empty() && !expected.is_empty() => {
            Ok((input, expected))
        }
        _ => anyhow::bail!("test case {:?} is not <input>:<output>", spec),
    }
}

async fn load_case(spec: &str) -> Result<TestCase> {
    let (input, expected) = split_case(spec)?;
    let input = String::from_utf8(read(Path::new(input)).await?)
        .with_context(|| format!("{} is not UTF-8", input))?;
    let expected = String::from_utf8(read(Path::new(expected)).await?)
        .with_context(|| format!("{} is not UTF-8", expected))?;
    Ok(TestCase::new(input, expected))
}

fn set_panic_hook() {
    panic::set_hook(Box::new(|panic_info| {
        tracing::error!(
            message = "panic occurred",
            panic = %panic_info
        );
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_case() {
        assert_eq!(split_case("1.in:1.out").unwrap(), ("1.in", "1.out"));
        assert_eq!(
            split_case("cases/a:b/1.in:cases/1.out").unwrap(),
            ("cases/a:b/1.in", "cases/1.out")
        );
        assert!(split_case("1.in").is_err());
        assert!(split_case("1.in:").is_err());
        assert!(split_case(":1.out").is_err());
    }
}
