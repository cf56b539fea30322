//! Wire codecs and framing
//!
//! Every message travels as a 4-byte big-endian length followed by the
//! encoded payload.

use std::fmt;
use std::io;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::error::ProtocolError;

/// Largest accepted payload
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Payload encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    #[default]
    Json,
    MsgPack,
}

impl Codec {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "json" => Some(Codec::Json),
            "msgpack" => Some(Codec::MsgPack),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Codec::Json => "json",
            Codec::MsgPack => "msgpack",
        }
    }

    pub fn encode<T: Serialize>(
        self,
        message: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        match self {
            Codec::Json => {
                serde_json::to_vec(message).map_err(|e| ProtocolError::Encode(e.to_string()))
            }
            Codec::MsgPack => {
                rmp_serde::to_vec_named(message).map_err(|e| ProtocolError::Encode(e.to_string()))
            }
        }
    }

    pub fn decode<T: DeserializeOwned>(
        self,
        bytes: &[u8],
    ) -> Result<T, ProtocolError> {
        match self {
            Codec::Json => {
                serde_json::from_slice(bytes).map_err(|e| ProtocolError::Decode(e.to_string()))
            }
            Codec::MsgPack => {
                rmp_serde::from_slice(bytes).map_err(|e| ProtocolError::Decode(e.to_string()))
            }
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Encode `message` and write it as one frame
pub async fn write_frame<W, T>(
    writer: &mut W,
    codec: Codec,
    message: &T,
) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin + ?Sized,
    T: Serialize,
{
    let payload = codec.encode(message)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(payload.len()));
    }
    writer.write_u32(payload.len() as u32).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame and decode it. `Ok(None)` means the peer closed the
/// connection cleanly between frames.
pub async fn read_frame<R, T>(
    reader: &mut R,
    codec: Codec,
) -> Result<Option<T>, ProtocolError>
where
    R: AsyncRead + Unpin + ?Sized,
    T: DeserializeOwned,
{
    match read_payload(reader).await? {
        Some(payload) => codec.decode(&payload).map(Some),
        None => Ok(None),
    }
}

/// Read one raw frame payload. A payload that then fails to decode leaves
/// the stream positioned at the next frame.
pub async fn read_payload<R>(reader: &mut R) -> Result<Option<Vec<u8>>, ProtocolError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}
