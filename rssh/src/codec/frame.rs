//! Length-prefixed framing over an async byte stream.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Error, Result};

/// The largest frame this implementation will send or accept.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Write one length-prefixed frame to `writer`.
pub async fn write(writer: &mut (impl AsyncWriteExt + Unpin), body: &[u8]) -> Result<()> {
    if body.len() > MAX_FRAME_SIZE {
        return Err(Error::FramingError(format!(
            "refusing to send a {} byte frame, exceeds the {MAX_FRAME_SIZE} byte maximum",
            body.len()
        )));
    }

    writer.write_u32(body.len() as u32).await?;
    writer.write_all(body).await?;
    writer.flush().await?;

    Ok(())
}

/// Read one length-prefixed frame from `reader`.
///
/// A clean EOF while reading the length prefix is reported as
/// [`Error::ConnectionClosed`]; a truncated body is an I/O error bubbled
/// from the underlying reader.
pub async fn read(reader: &mut (impl AsyncReadExt + Unpin)) -> Result<Vec<u8>> {
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(Error::ConnectionClosed)
        }
        Err(err) => return Err(err.into()),
    };

    if len > MAX_FRAME_SIZE {
        return Err(Error::FramingError(format!(
            "incoming frame announces {len} bytes, exceeds the {MAX_FRAME_SIZE} byte maximum"
        )));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.map_err(|err| {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::ConnectionClosed
        } else {
            Error::from(err)
        }
    })?;

    Ok(body)
}
