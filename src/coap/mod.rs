//! CoAP transport for the resource tree
//!
//! - `message`: RFC 7252 message codec
//! - `exchange`: mapping between CoAP messages and LDP requests/responses
//! - `server`: UDP server loop

pub mod exchange;
pub mod message;
pub mod server;

// Re-export main types
pub use exchange::{decode_request, encode_response, Incoming};
pub use message::{option, CoapError, CoapResult, Message, MessageType};
pub use server::{handle_datagram, CoapServer};
