//! Length-prefixed bincode framing shared by both message directions.
//!
//! Each frame is a 4-byte big-endian length prefix followed by that many
//! bytes of bincode-encoded payload. A fixed cap on packet size defends
//! against memory exhaustion from a misbehaving or malicious peer.

use serde::{de::DeserializeOwned, Serialize};

use crate::errors::TransportError;

pub const MAX_FRAME_BYTES: usize = 10 * 1024 * 1024;
const LENGTH_PREFIX_BYTES: usize = 4;

pub fn encode_frame<T: Serialize>(message: &T) -> Result<Vec<u8>, TransportError> {
    let payload = bincode::serialize(message)?;
    if payload.len() > MAX_FRAME_BYTES {
        return Err(TransportError::PacketTooLarge {
            size: payload.len(),
            limit: MAX_FRAME_BYTES,
        });
    }

    let mut framed = Vec::with_capacity(LENGTH_PREFIX_BYTES + payload.len());
    framed.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    framed.extend_from_slice(&payload);
    Ok(framed)
}

/// Decodes a single frame that already has its length prefix stripped
/// (the caller's transport layer — e.g. a websocket binary message — is
/// responsible for delimiting frames; this just validates and decodes).
pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T, TransportError> {
    if payload.len() > MAX_FRAME_BYTES {
        return Err(TransportError::PacketTooLarge {
            size: payload.len(),
            limit: MAX_FRAME_BYTES,
        });
    }
    bincode::deserialize(payload).map_err(TransportError::Encode)
}

/// Reads the 4-byte length prefix from the front of a byte stream buffer,
/// returning the declared payload length without consuming the buffer.
pub fn peek_frame_length(buffer: &[u8]) -> Option<usize> {
    if buffer.len() < LENGTH_PREFIX_BYTES {
        return None;
    }
    let mut len_bytes = [0u8; LENGTH_PREFIX_BYTES];
    len_bytes.copy_from_slice(&buffer[..LENGTH_PREFIX_BYTES]);
    Some(u32::from_be_bytes(len_bytes) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::OutboundMessage;

    #[test]
    fn encode_then_decode_round_trips() {
        let message = OutboundMessage::CrackBatchesComplete {
            task_id: "task-1".to_string(),
        };
        let framed = encode_frame(&message).unwrap();
        let length = peek_frame_length(&framed).unwrap();
        let payload = &framed[4..4 + length];
        let decoded: OutboundMessage = decode_payload(payload).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let message = OutboundMessage::OutputChunk {
            task_id: "t".to_string(),
            text: "x".repeat(MAX_FRAME_BYTES + 1),
            is_error: false,
        };
        let result = encode_frame(&message);
        assert!(matches!(result, Err(TransportError::PacketTooLarge { .. })));
    }

    #[test]
    fn peek_frame_length_requires_full_prefix() {
        assert!(peek_frame_length(&[0, 0, 1]).is_none());
        assert_eq!(peek_frame_length(&[0, 0, 0, 5, 9]), Some(5));
    }
}
