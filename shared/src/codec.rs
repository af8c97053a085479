//! Envelope framing for the provider link
//!
//! Each frame is a big-endian `u32` length followed by one protobuf
//! [`Envelope`]. Framing is delegated to [`LengthDelimitedCodec`];
//! [`EnvelopeCodec`] layers the protobuf step on top so a socket half can be
//! wrapped in `FramedRead`/`FramedWrite` directly.

use bytes::BytesMut;
use prost::Message;
use std::io;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use crate::Envelope;

/// Largest envelope accepted in either direction (10 MB)
pub const MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Envelope of {size} bytes exceeds the {MAX_FRAME_SIZE} byte frame limit")]
    MessageTooLarge { size: usize },

    /// Socket failure, or a length prefix over the limit
    #[error("Frame I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Protobuf encode error: {0}")]
    Encode(#[from] prost::EncodeError),
}

impl CodecError {
    /// Whether the underlying byte stream is unusable after this error
    pub fn is_transport(&self) -> bool {
        matches!(self, CodecError::Io(_))
    }
}

/// Length-delimited protobuf envelopes
#[derive(Debug)]
pub struct EnvelopeCodec {
    frames: LengthDelimitedCodec,
}

impl EnvelopeCodec {
    pub fn new() -> Self {
        Self {
            frames: LengthDelimitedCodec::builder()
                .length_field_length(4)
                .big_endian()
                .max_frame_length(MAX_FRAME_SIZE)
                .new_codec(),
        }
    }
}

impl Default for EnvelopeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for EnvelopeCodec {
    type Item = Envelope;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Envelope>, CodecError> {
        match self.frames.decode(src)? {
            Some(frame) => Ok(Some(Envelope::decode(frame.freeze())?)),
            None => Ok(None),
        }
    }
}

impl Encoder<Envelope> for EnvelopeCodec {
    type Error = CodecError;

    fn encode(&mut self, envelope: Envelope, dst: &mut BytesMut) -> Result<(), CodecError> {
        let size = envelope.encoded_len();
        if size > MAX_FRAME_SIZE {
            return Err(CodecError::MessageTooLarge { size });
        }

        let mut body = BytesMut::with_capacity(size);
        envelope.encode(&mut body)?;
        self.frames.encode(body.freeze(), dst)?;
        Ok(())
    }
}
