use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Max single-frame size, generous enough for any realistic source snippet
/// plus captured output while still bounding a misbehaving peer.
const MAX_FRAME_LEN: u32 = 8 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame of {len} bytes exceeds the {MAX_FRAME_LEN}-byte limit")]
    TooLarge { len: u32 },
    #[error("connection closed mid-frame")]
    Eof,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON frame: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes `value` as a 4-byte big-endian length prefix followed by its JSON
/// encoding.
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(value)?;
    let len = u32::try_from(body.len()).map_err(|_| FrameError::TooLarge { len: u32::MAX })?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one length-prefixed JSON frame. Returns `Ok(None)` on a clean
/// connection close between frames (zero bytes read for the length prefix).
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>, FrameError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(FrameError::Io(err)),
    }
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge { len });
    }

    let mut body = vec![0u8; len as usize];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|err| match err.kind() {
            std::io::ErrorKind::UnexpectedEof => FrameError::Eof,
            _ => FrameError::Io(err),
        })?;

    Ok(Some(serde_json::from_slice(&body)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CompileArgs, RpcRequest};

    #[tokio::test]
    async fn round_trips_one_frame() {
        let mut buf = Vec::new();
        let req = RpcRequest::Compile(CompileArgs {
            code: "puts(1);".into(),
            lang: "c11".into(),
        });
        write_frame(&mut buf, &req).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let decoded: RpcRequest = read_frame(&mut cursor).await.unwrap().unwrap();
        match decoded {
            RpcRequest::Compile(args) => assert_eq!(args.lang, "c11"),
            RpcRequest::List => panic!("wrong variant"),
        }
    }

    #[tokio::test]
    async fn clean_close_before_any_frame_returns_none() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        let decoded: Option<RpcRequest> = read_frame(&mut cursor).await.unwrap();
        assert!(decoded.is_none());
    }
}
