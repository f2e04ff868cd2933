//! The coordinator-facing transport contract (spec component C9): message
//! types plus the length-prefixed bincode frame codec they travel over.

pub mod errors;
pub mod frame;
pub mod messages;

pub use errors::TransportError;
pub use frame::{decode_payload, encode_frame, peek_frame_length, MAX_FRAME_BYTES};
pub use messages::{InboundMessage, OutboundMessage};
