use std::{
    io::Write,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use tokio::process::Command;
use uuid::Uuid;

use crate::{
    constants::SOURCE_FILE_PREFIX,
    core::{
        artifact::Artifact,
        domain::{CompilationLimits, Language},
        errors::CompileError,
        traits::compiler::Compiler,
    },
    native::process::{drain, remove_if_exists, terminate},
};

/// Compiles C and C++ sources with the host toolchain.
#[derive(Clone, Debug)]
pub struct NativeCompiler {
    dir: PathBuf,
    gcc_path: PathBuf,
    gxx_path: PathBuf,
}

impl NativeCompiler {
    pub fn new<T, U, V>(dir: T, gcc_path: U, gxx_path: V) -> Self
    where
        T: AsRef<Path>,
        U: AsRef<Path>,
        V: AsRef<Path>,
    {
        NativeCompiler {
            dir: dir.as_ref().into(),
            gcc_path: gcc_path.as_ref().into(),
            gxx_path: gxx_path.as_ref().into(),
        }
    }

    fn command(&self, language: &Language, source_path: &Path, artifact_path: &Path) -> Command {
        let mut cmd = match language {
            Language::C => Command::new(&self.gcc_path),
            Language::Cpp => {
                let mut cmd = Command::new(&self.gxx_path);
                cmd.arg("-O3");
                cmd
            }
        };
        cmd.arg(source_path)
            .arg("-o")
            .arg(artifact_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);
        cmd
    }

    fn write_source(
        &self,
        source: &[u8],
        language: &Language,
    ) -> Result<tempfile::NamedTempFile, CompileError> {
        let mut file = tempfile::Builder::new()
            .prefix(SOURCE_FILE_PREFIX)
            .suffix(language.source_extension())
            .tempfile_in(&self.dir)
            .map_err(|e| CompileError::Internal {
                msg: format!("Failed to create source file: {}", e),
            })?;
        file.write_all(source)
            .and_then(|_| file.flush())
            .map_err(|e| CompileError::Internal {
                msg: format!("Failed to write source code: {}", e),
            })?;
        Ok(file)
    }
}

async fn discard(artifact_path: &Path) {
    if let Err(e) = remove_if_exists(artifact_path).await {
        tracing::warn!(
            "Failed to remove partial artifact {}: {}",
            artifact_path.display(),
            e
        );
    }
}

#[async_trait::async_trait]
impl Compiler for NativeCompiler {
    #[tracing::instrument(skip(self, source), fields(source_len = source.len()))]
    async fn compile(
        &self,
        source: &[u8],
        language: &Language,
        limits: &CompilationLimits,
    ) -> Result<Artifact, CompileError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CompileError::Internal { msg: e.to_string() })?;

        // Removed on every return path below when `source_file` drops.
        let source_file = self.write_source(source, language)?;

        let artifact_id = Uuid::new_v4();
        let artifact_path = Artifact::path_for(&self.dir, *language, artifact_id);

        let mut child = self
            .command(language, source_file.path(), &artifact_path)
            .spawn()
            .map_err(|e| CompileError::Internal {
                msg: format!("Failed to execute compiler: {}", e),
            })?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        tracing::debug!("Compiling {} into {}", language, artifact_path.display());
        let compilation = async {
            let (status, _, stderr) = tokio::join!(child.wait(), drain(stdout), drain(stderr));
            (status, stderr)
        };
        let (status, stderr) = match limits.time_ms {
            Some(limit_ms) => {
                let finished =
                    tokio::time::timeout(Duration::from_millis(limit_ms), compilation).await;
                match finished {
                    Ok(finished) => finished,
                    Err(_) => {
                        // The driver's cc1/as/ld children are in its group.
                        terminate(&mut child).await;
                        discard(&artifact_path).await;
                        return Err(CompileError::TimedOut { limit_ms });
                    }
                }
            }
            None => compilation.await,
        };
        let wait_err = |e: std::io::Error| CompileError::Internal {
            msg: format!("Failed to wait for compiler: {}", e),
        };
        let status = status.map_err(wait_err)?;
        let stderr = stderr.map_err(wait_err)?;

        if !status.success() {
            tracing::debug!("Compiler exited with {}", status);
            discard(&artifact_path).await;
            return Err(CompileError::CompilationFailed {
                diagnostics: String::from_utf8_lossy(&stderr).to_string(),
            });
        }

        if !tokio::fs::try_exists(&artifact_path).await.unwrap_or(false) {
            return Err(CompileError::Internal {
                msg: format!(
                    "Executable file was not created at: {}",
                    artifact_path.display()
                ),
            });
        }

        Ok(Artifact::new(artifact_id, *language, artifact_path))
    }
}
