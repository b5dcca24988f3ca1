use std::{os::unix::process::ExitStatusExt, path::Path, process::Stdio, time::Duration};

use tokio::{
    io::AsyncWriteExt,
    process::{ChildStdin, Command},
    time::Instant,
};

use crate::{
    core::{domain::RunOutput, errors::RunError, traits::runner::Runner},
    native::process::{drain, kill_group, terminate},
};

/// Runs compiled artifacts as plain child processes.
///
/// There is no isolation: the process inherits the judge's environment,
/// filesystem view and network access.
#[derive(Clone, Debug, Default)]
pub struct NativeRunner;

impl NativeRunner {
    pub fn new() -> Self {
        Self
    }
}

async fn feed_stdin(stdin: Option<ChildStdin>, input: &[u8]) {
    let Some(mut stdin) = stdin else {
        return;
    };
    // A program may exit without reading its input.
    if let Err(e) = stdin.write_all(input).await {
        tracing::debug!("Stdin closed early: {}", e);
    }
}

fn describe_exit(status: std::process::ExitStatus) -> String {
    match (status.code(), status.signal()) {
        (Some(code), _) => format!("exit status: {}", code),
        (None, Some(signal)) => format!("signal: {}", signal),
        (None, None) => status.to_string(),
    }
}

#[async_trait::async_trait]
impl Runner for NativeRunner {
    #[tracing::instrument(skip(self, stdin), fields(stdin_len = stdin.len()))]
    async fn run(
        &self,
        executable: &Path,
        stdin: &[u8],
        timeout: Duration,
    ) -> Result<RunOutput, RunError> {
        let started = Instant::now();
        let deadline = started + timeout;

        let mut child = Command::new(executable)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RunError::Launch {
                msg: format!("{}: {}", executable.display(), e),
            })?;
        let pgid = child.id();

        let child_stdin = child.stdin.take();
        let child_stdout = child.stdout.take();
        let child_stderr = child.stderr.take();

        let finished = {
            let run = async {
                let (status, stdout, stderr, ()) = tokio::join!(
                    child.wait(),
                    drain(child_stdout),
                    drain(child_stderr),
                    feed_stdin(child_stdin, stdin),
                );
                (status, stdout, stderr)
            };
            tokio::time::timeout_at(deadline, run).await
        };

        let Ok((status, stdout, stderr)) = finished else {
            // Forked descendants share the group and die with the child.
            terminate(&mut child).await;
            tracing::debug!("Process timed out after {:?}", timeout);
            return Err(RunError::TimedOut {
                timeout_ms: timeout.as_millis() as u64,
            });
        };

        let execution_time_ms = started.elapsed().as_millis() as u64;
        // Background processes that closed their output may still be alive.
        if let Some(pgid) = pgid {
            kill_group(pgid);
        }
        let io_err = |e: std::io::Error| RunError::Launch {
            msg: format!("Failed to wait for process: {}", e),
        };
        let status = status.map_err(io_err)?;
        let stdout = stdout.map_err(io_err)?;
        let stderr = stderr.map_err(io_err)?;

        if !status.success() {
            tracing::debug!("Process exited with {}", status);
            return Err(RunError::RuntimeError {
                exit: describe_exit(status),
                stderr: String::from_utf8_lossy(&stderr).to_string(),
            });
        }

        Ok(RunOutput {
            stdout,
            stderr,
            execution_time_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, time::Duration};

    use crate::{
        core::{errors::RunError, traits::runner::Runner},
        native::{
            runner::NativeRunner,
            tests::{is_running, wait_until_gone},
        },
    };

    fn script(dir: &std::path::Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_stdin_is_echoed_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let cat = script(dir.path(), "cat.sh", "exec cat");

        let result = NativeRunner::new()
            .run(&cat, b"  2 3\n\n", Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(result.stdout, b"  2 3\n\n");
        assert!(result.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_empty_output_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let silent = script(dir.path(), "silent.sh", "exit 0");

        let result = NativeRunner::new()
            .run(&silent, b"", Duration::from_secs(5))
            .await
            .unwrap();

        assert!(result.stdout.is_empty());
    }

    #[tokio::test]
    async fn test_ignored_large_input() {
        let dir = tempfile::tempdir().unwrap();
        let silent = script(dir.path(), "silent.sh", "exit 0");
        let input = vec![b'x'; 1024 * 1024];

        let result = NativeRunner::new()
            .run(&silent, &input, Duration::from_secs(5))
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_runtime_error() {
        let dir = tempfile::tempdir().unwrap();
        let failing = script(dir.path(), "fail.sh", "echo partial\necho 'boom' >&2\nexit 3");

        let result = NativeRunner::new()
            .run(&failing, b"", Duration::from_secs(5))
            .await;

        match result {
            Err(RunError::RuntimeError { exit, stderr }) => {
                assert_eq!(exit, "exit status: 3");
                assert_eq!(stderr, "boom\n");
            }
            other => panic!("Expected RuntimeError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_signal_is_runtime_error() {
        let dir = tempfile::tempdir().unwrap();
        let killed = script(dir.path(), "killed.sh", "kill -9 $$");

        let result = NativeRunner::new()
            .run(&killed, b"", Duration::from_secs(5))
            .await;

        match result {
            Err(RunError::RuntimeError { exit, .. }) => assert_eq!(exit, "signal: 9"),
            other => panic!("Expected RuntimeError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let sleeper = script(
            dir.path(),
            "sleep.sh",
            &format!("echo $$ > {}\nexec sleep 10", pid_file.display()),
        );

        let started = std::time::Instant::now();
        let result = NativeRunner::new()
            .run(&sleeper, b"", Duration::from_millis(300))
            .await;

        assert!(matches!(result, Err(RunError::TimedOut { timeout_ms: 300 })));
        assert!(started.elapsed() < Duration::from_secs(5));

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        assert!(!is_running(&pid), "Process {} is still running", pid.trim());
    }

    #[tokio::test]
    async fn test_timeout_kills_forked_descendants() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let forking = script(
            dir.path(),
            "fork.sh",
            &format!("sleep 10 &\necho $! > {}\nwait", pid_file.display()),
        );

        let result = NativeRunner::new()
            .run(&forking, b"", Duration::from_millis(300))
            .await;

        assert!(matches!(result, Err(RunError::TimedOut { timeout_ms: 300 })));
        let pid = std::fs::read_to_string(&pid_file).unwrap();
        assert!(
            wait_until_gone(&pid, Duration::from_secs(2)).await,
            "Forked process {} outlived the deadline",
            pid.trim()
        );
    }

    #[tokio::test]
    async fn test_background_process_does_not_outlive_success() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let detached = script(
            dir.path(),
            "detached.sh",
            &format!(
                "sleep 10 >/dev/null 2>&1 </dev/null &\necho $! > {}\necho done",
                pid_file.display()
            ),
        );

        let result = NativeRunner::new()
            .run(&detached, b"", Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(result.stdout, b"done\n");
        let pid = std::fs::read_to_string(&pid_file).unwrap();
        assert!(wait_until_gone(&pid, Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn test_missing_executable_fails_at_run_time() {
        let dir = tempfile::tempdir().unwrap();

        let result = NativeRunner::new()
            .run(&dir.path().join("missing"), b"", Duration::from_secs(1))
            .await;

        assert!(matches!(result, Err(RunError::Launch { .. })));
    }
}
