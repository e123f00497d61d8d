//! Native messaging framing.
//!
//! Each message is a 4-byte little-endian length followed by that many
//! bytes of UTF-8 JSON, in both directions. Wraps
//! [`tokio_util::codec::LengthDelimitedCodec`] with the fixed header layout
//! and a frame size cap.
//!
//! # Usage
//!
//! Use [`NativeMessageCodec`] with [`tokio_util::codec::FramedRead`] over
//! stdin and [`tokio_util::codec::FramedWrite`] over stdout. The codec only
//! frames bytes; JSON decoding happens in [`crate::transport::native`].

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use crate::{AppError, Result};

/// Largest accepted frame: 64 MiB.
///
/// A header announcing more than this makes [`NativeMessageCodec::decode`]
/// fail with [`AppError::Ipc`] before any payload is buffered.
pub const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Length-prefixed JSON codec for native messaging over stdio.
///
/// # Decoder
///
/// Yields one payload per complete frame, without the header. Returns
/// `Ok(None)` while a frame is still partial. Oversized or malformed headers
/// map to [`AppError::Ipc`]`("frame too large or malformed: …")`.
/// [`Decoder::decode_eof`] also reports a truncated trailing frame as
/// [`AppError::Ipc`].
///
/// # Encoder
///
/// Prefixes the payload with its length as a little-endian `u32`. Payloads
/// over [`MAX_FRAME_BYTES`] are rejected.
///
/// # Examples
///
/// ```rust,ignore
/// use tokio_util::codec::FramedRead;
/// use shipctl::transport::codec::NativeMessageCodec;
///
/// let frames = FramedRead::new(tokio::io::stdin(), NativeMessageCodec::new());
/// ```
#[derive(Debug)]
pub struct NativeMessageCodec(LengthDelimitedCodec);

impl NativeMessageCodec {
    /// Codec with the native messaging header layout.
    #[must_use]
    pub fn new() -> Self {
        Self(
            LengthDelimitedCodec::builder()
                .little_endian()
                .length_field_length(4)
                .max_frame_length(MAX_FRAME_BYTES)
                .new_codec(),
        )
    }
}

impl Default for NativeMessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for NativeMessageCodec {
    type Item = BytesMut;
    type Error = AppError;

    /// Decode the next complete frame from `src`, if one is buffered.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode(src).map_err(map_codec_error)
    }

    /// Like [`Decoder::decode`], but leftover bytes at end of input are an
    /// error.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode_eof(src).map_err(map_codec_error)
    }
}

impl Encoder<Bytes> for NativeMessageCodec {
    type Error = AppError;

    /// Append `item` to `dst` behind its length header.
    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        self.0.encode(item, dst).map_err(map_codec_error)
    }
}

fn map_codec_error(err: std::io::Error) -> AppError {
    if err.kind() == std::io::ErrorKind::InvalidData {
        AppError::Ipc(format!("frame too large or malformed: {err}"))
    } else {
        AppError::Ipc(err.to_string())
    }
}
