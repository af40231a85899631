//! Length-prefixed MessagePack codec for tokio I/O.
//!
//! Framing: `[4 bytes: payload length, big-endian u32][N bytes: MessagePack payload]`

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::protocol::{MAX_PAYLOAD_SIZE, Message, RawEnvelope};

/// Codec error type.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("payload too large: {0} bytes (max {MAX_PAYLOAD_SIZE})")]
    PayloadTooLarge(usize),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("MessagePack encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("MessagePack decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Frame-level codec: handles only length-prefixed framing.
///
/// Yields raw payloads without deserializing. The daemon uses it with
/// [`decode_frame`] so that undecodable requests can still be answered
/// with their echoed `id`.
#[derive(Debug, Default)]
pub struct FrameCodec {
    /// Length of the current frame being read, if the header has been consumed.
    pending_len: Option<usize>,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self { pending_len: None }
    }
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let payload_len = match self.pending_len {
            Some(len) => len,
            None => {
                if src.len() < 4 {
                    return Ok(None);
                }
                let len = src.get_u32() as usize;
                if len > MAX_PAYLOAD_SIZE {
                    return Err(CodecError::PayloadTooLarge(len));
                }
                self.pending_len = Some(len);
                len
            }
        };

        if src.len() < payload_len {
            src.reserve(payload_len - src.len());
            return Ok(None);
        }

        self.pending_len = None;
        Ok(Some(src.split_to(payload_len)))
    }
}

impl Encoder<Message> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = rmp_serde::to_vec_named(&item)?;
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(CodecError::PayloadTooLarge(payload.len()));
        }
        dst.reserve(4 + payload.len());
        dst.put_u32(payload.len() as u32);
        dst.extend_from_slice(&payload);
        Ok(())
    }
}

/// Message-level codec for clients.
///
/// Frames with [`FrameCodec`] and decodes every payload as a
/// [`Message`]; a payload that is not a known message is an error.
#[derive(Debug, Default)]
pub struct LengthPrefixedCodec {
    frames: FrameCodec,
}

impl LengthPrefixedCodec {
    pub fn new() -> Self {
        Self {
            frames: FrameCodec::new(),
        }
    }
}

impl Decoder for LengthPrefixedCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.frames.decode(src)? {
            Some(payload) => Ok(Some(rmp_serde::from_slice(&payload)?)),
            None => Ok(None),
        }
    }
}

impl Encoder<Message> for LengthPrefixedCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.frames.encode(item, dst)
    }
}

/// Result of attempting to decode a raw frame into a protocol message.
#[derive(Debug)]
pub enum DecodeResult {
    /// Successfully decoded a known message variant.
    Ok(Message),
    /// Unknown type, method or params: envelope kept for the error reply.
    UnknownType(RawEnvelope),
    /// Completely malformed: could not even extract `{type, id}`.
    Malformed(rmp_serde::decode::Error),
}

/// Attempt two-phase decode of a raw frame.
///
/// 1. Try to deserialize as [`Message`].
/// 2. On failure, try [`RawEnvelope`] to extract `{type, id}`.
/// 3. If both fail, return [`DecodeResult::Malformed`].
pub fn decode_frame(payload: &[u8]) -> DecodeResult {
    match rmp_serde::from_slice::<Message>(payload) {
        Ok(msg) => DecodeResult::Ok(msg),
        Err(_) => match rmp_serde::from_slice::<RawEnvelope>(payload) {
            Ok(envelope) => DecodeResult::UnknownType(envelope),
            Err(e) => DecodeResult::Malformed(e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::protocol::*;
    use crate::telephony::PlatformPayload;

    fn encode_message(msg: &Message) -> BytesMut {
        let mut codec = LengthPrefixedCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(msg.clone(), &mut buf).unwrap();
        buf
    }

    #[test]
    fn round_trip_through_codec() {
        let msg = Message::Invoke {
            id: 1,
            call: Command::GetCallState,
        };
        let mut buf = encode_message(&msg);
        let decoded = LengthPrefixedCodec::new().decode(&mut buf).unwrap();
        assert_eq!(decoded, Some(msg));
    }

    #[test]
    fn partial_header_returns_none() {
        let mut codec = LengthPrefixedCodec::new();
        let mut buf = BytesMut::from(&[0u8, 0][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn partial_payload_then_rest() {
        let msg = Message::InjectState {
            id: 2,
            sub_id: None,
            payload: PlatformPayload::DataConnectionState { state: 2 },
        };
        let mut full = encode_message(&msg);
        let half = full.len() / 2;
        let mut partial = full.split_to(half);

        let mut codec = LengthPrefixedCodec::new();
        assert!(codec.decode(&mut partial).unwrap().is_none());

        partial.extend_from_slice(&full);
        assert_eq!(codec.decode(&mut partial).unwrap(), Some(msg));
    }

    #[test]
    fn multiple_messages_in_buffer() {
        let first = Message::Invoke {
            id: 1,
            call: Command::IsRinging,
        };
        let second = Message::Invoke {
            id: 2,
            call: Command::IsInCall,
        };
        let mut codec = LengthPrefixedCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(first.clone(), &mut buf).unwrap();
        codec.encode(second.clone(), &mut buf).unwrap();

        let mut codec = LengthPrefixedCodec::new();
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(first));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(second));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn payload_too_large_on_decode() {
        let mut buf = BytesMut::new();
        buf.put_u32((17 * 1024 * 1024) as u32);
        buf.extend_from_slice(&[0u8; 16]);

        let err = FrameCodec::new().decode(&mut buf).unwrap_err();
        assert!(matches!(err, CodecError::PayloadTooLarge(_)));
    }

    #[test]
    fn frame_length_header_is_big_endian() {
        let buf = encode_message(&Message::Invoke {
            id: 0,
            call: Command::EndCall,
        });
        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        assert_eq!(buf.len() - 4, len);
    }

    #[test]
    fn decode_frame_classifies_payloads() {
        let known = rmp_serde::to_vec_named(&Message::Invoke {
            id: 1,
            call: Command::EndCall,
        })
        .unwrap();
        assert!(matches!(decode_frame(&known), DecodeResult::Ok(_)));

        #[derive(serde::Serialize)]
        struct Unknown {
            #[serde(rename = "type")]
            msg_type: &'static str,
            id: u32,
        }
        let unknown = rmp_serde::to_vec_named(&Unknown {
            msg_type: "frobnicate",
            id: 42,
        })
        .unwrap();
        match decode_frame(&unknown) {
            DecodeResult::UnknownType(env) => assert_eq!(env.id, 42),
            other => panic!("expected UnknownType, got {other:?}"),
        }

        assert!(matches!(
            decode_frame(&[0xc1]),
            DecodeResult::Malformed(_)
        ));
    }
}
