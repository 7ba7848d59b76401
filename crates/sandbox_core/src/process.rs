use std::{path::Path, time::Duration};

use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Command,
};

use crate::error::CoreError;

/// Reads a stream to completion, capping at `max_bytes`. Bytes past the cap
/// are discarded (not buffered) so a runaway child cannot exhaust memory.
pub(crate) async fn capture_stream<R>(mut reader: R, max_bytes: usize) -> Result<Vec<u8>, std::io::Error>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        if buffer.len() < max_bytes {
            let take = std::cmp::min(n, max_bytes - buffer.len());
            buffer.extend_from_slice(&chunk[..take]);
        }
    }
    Ok(buffer)
}

/// Spawns `command`, retrying on `ETXTBSY` (the target binary is mid-write by
/// another process, observed transiently under concurrent builds).
pub(crate) fn spawn_with_retry(
    command: &mut Command,
    binary: &Path,
) -> Result<tokio::process::Child, CoreError> {
    let mut backoff = Duration::from_millis(2);
    for attempt in 0..5 {
        match command.spawn() {
            Ok(child) => return Ok(child),
            Err(source) => {
                let is_busy = matches!(source.kind(), std::io::ErrorKind::ExecutableFileBusy)
                    || source.raw_os_error() == Some(26);
                if is_busy && attempt < 4 {
                    std::thread::sleep(backoff);
                    backoff = std::cmp::min(backoff * 2, Duration::from_millis(50));
                    continue;
                }
                return Err(CoreError::Spawn {
                    binary: binary.to_path_buf(),
                    source,
                });
            }
        }
    }

    unreachable!("spawn_with_retry should return before exhausting retries")
}
