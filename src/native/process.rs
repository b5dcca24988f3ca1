use std::path::Path;

use nix::{
    errno::Errno,
    sys::signal::{Signal, killpg},
    unistd::Pid,
};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Child,
};

pub(crate) async fn drain<R: AsyncRead + Unpin>(reader: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        reader.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Sends SIGKILL to every process in group `pgid`. An empty group is not an error.
pub(crate) fn kill_group(pgid: u32) {
    match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => tracing::warn!("Failed to kill process group {}: {}", pgid, e),
    }
}

/// Kills the group led by `child` and reaps `child` itself.
///
/// `child` must have been spawned with `process_group(0)`, so its pid is the
/// group id and anything it forked is signalled too.
pub(crate) async fn terminate(child: &mut Child) {
    if let Some(pid) = child.id() {
        kill_group(pid);
    }
    if let Err(e) = child.wait().await {
        tracing::warn!("Failed to reap killed process: {}", e);
    }
}

/// Removes `path`, treating an already missing file as success.
pub(crate) async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
