//! Length-prefixed frames over a byte stream.
//!
//! ```text
//! +-------------------+--------------------+
//! | length (4 bytes)  |   JSON payload     |
//! | u32 little-endian |   (length bytes)   |
//! +-------------------+--------------------+
//! ```
//!
//! The length excludes the prefix itself. A zero-length frame is valid and
//! carries no message.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Default upper bound on a single payload: 1 MiB.
pub const DEFAULT_MAX_PAYLOAD: u32 = 1 << 20;

#[derive(Debug, Clone)]
pub struct FrameConfig {
    pub max_payload_size: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("payload size {size} exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: u32 },
    #[error("connection closed")]
    ConnectionClosed,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn closed_or_io(e: std::io::Error) -> FrameError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        FrameError::ConnectionClosed
    } else {
        FrameError::Io(e)
    }
}

/// Read one frame and return its payload.
///
/// A peer that disconnects mid-frame or between frames yields
/// [`FrameError::ConnectionClosed`].
pub async fn read_frame<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    config: &FrameConfig,
) -> Result<Vec<u8>, FrameError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await.map_err(closed_or_io)?;

    let len = u32::from_le_bytes(len_buf);
    if len > config.max_payload_size {
        return Err(FrameError::PayloadTooLarge {
            size: len as usize,
            max: config.max_payload_size,
        });
    }

    let mut payload = vec![0u8; len as usize];
    if len > 0 {
        reader.read_exact(&mut payload).await.map_err(closed_or_io)?;
    }
    Ok(payload)
}

/// Write `payload` as one frame and flush.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    payload: &[u8],
    config: &FrameConfig,
) -> Result<(), FrameError> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= config.max_payload_size)
        .ok_or(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: config.max_payload_size,
        })?;

    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}
