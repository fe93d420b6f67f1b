//! CoAP message codec
//!
//! Based on RFC 7252 section 3: a 4-byte header, the token, delta-encoded
//! options and an optional payload behind the `0xFF` marker.

use bytes::{BufMut, Bytes, BytesMut};
use std::io;
use thiserror::Error;

/// CoAP codec errors
#[derive(Error, Debug)]
pub enum CoapError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed message
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Datagram ends inside the header, token or an option
    #[error("Truncated message")]
    Truncated,

    #[error("Unsupported CoAP version {0}")]
    UnsupportedVersion(u8),
}

pub type CoapResult<T> = Result<T, CoapError>;

pub const VERSION: u8 = 1;
pub const PAYLOAD_MARKER: u8 = 0xff;

/// Option numbers used by the server
pub mod option {
    pub const IF_MATCH: u16 = 1;
    pub const URI_HOST: u16 = 3;
    pub const ETAG: u16 = 4;
    pub const LOCATION_PATH: u16 = 8;
    pub const URI_PATH: u16 = 11;
    pub const CONTENT_FORMAT: u16 = 12;
    pub const URI_QUERY: u16 = 15;
    pub const ACCEPT: u16 = 17;
    pub const LOCATION_QUERY: u16 = 20;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Confirmable = 0,
    NonConfirmable = 1,
    Acknowledgement = 2,
    Reset = 3,
}

impl MessageType {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => MessageType::Confirmable,
            1 => MessageType::NonConfirmable,
            2 => MessageType::Acknowledgement,
            _ => MessageType::Reset,
        }
    }
}

/// One CoAP message, request or response
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub message_type: MessageType,
    /// `class << 5 | detail`
    pub code: u8,
    pub message_id: u16,
    pub token: Bytes,
    /// Kept sorted by option number; repeated options keep insertion order
    options: Vec<(u16, Bytes)>,
    pub payload: Bytes,
}

impl Message {
    pub fn new(message_type: MessageType, code: u8, message_id: u16) -> Self {
        Self {
            message_type,
            code,
            message_id,
            token: Bytes::new(),
            options: Vec::new(),
            payload: Bytes::new(),
        }
    }

    pub fn with_token(mut self, token: impl Into<Bytes>) -> Self {
        self.token = token.into();
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Empty message (code 0.00), used for pings and resets
    pub fn is_empty(&self) -> bool {
        self.code == 0
    }

    pub fn add_option(&mut self, number: u16, value: impl Into<Bytes>) {
        let idx = self.options.partition_point(|(n, _)| *n <= number);
        self.options.insert(idx, (number, value.into()));
    }

    pub fn add_uint_option(&mut self, number: u16, value: u32) {
        self.add_option(number, encode_uint(value));
    }

    pub fn add_string_option(&mut self, number: u16, value: &str) {
        self.add_option(number, Bytes::copy_from_slice(value.as_bytes()));
    }

    pub fn options(&self) -> &[(u16, Bytes)] {
        &self.options
    }

    pub fn option_values(&self, number: u16) -> impl Iterator<Item = &Bytes> + '_ {
        self.options
            .iter()
            .filter(move |(n, _)| *n == number)
            .map(|(_, v)| v)
    }

    pub fn option(&self, number: u16) -> Option<&Bytes> {
        self.option_values(number).next()
    }

    pub fn uint_option(&self, number: u16) -> Option<u32> {
        self.option(number).map(|v| decode_uint(v))
    }

    /// Encode the message into `buf`
    pub fn encode(&self, buf: &mut BytesMut) -> CoapResult<()> {
        if self.token.len() > 8 {
            return Err(CoapError::Protocol(format!(
                "token of {} bytes exceeds 8",
                self.token.len()
            )));
        }

        buf.put_u8(VERSION << 6 | (self.message_type as u8) << 4 | self.token.len() as u8);
        buf.put_u8(self.code);
        buf.put_u16(self.message_id);
        buf.put_slice(&self.token);

        let mut last = 0u16;
        for (number, value) in &self.options {
            let delta = number - last;
            let (delta_nibble, delta_ext) = extended(delta as usize)?;
            let (len_nibble, len_ext) = extended(value.len())?;
            buf.put_u8(delta_nibble << 4 | len_nibble);
            buf.put_slice(&delta_ext);
            buf.put_slice(&len_ext);
            buf.put_slice(value);
            last = *number;
        }

        if !self.payload.is_empty() {
            buf.put_u8(PAYLOAD_MARKER);
            buf.put_slice(&self.payload);
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> CoapResult<Bytes> {
        let mut buf = BytesMut::with_capacity(16 + self.payload.len());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode one datagram
    pub fn decode(datagram: &[u8]) -> CoapResult<Message> {
        let (message_type, code, message_id, tkl) = Self::decode_header(datagram)?;
        if tkl > 8 {
            return Err(CoapError::Protocol(format!("token length {} is reserved", tkl)));
        }

        let mut pos = 4;
        let token = take(datagram, &mut pos, tkl)?;
        let mut msg = Message::new(message_type, code, message_id).with_token(token);

        let mut number = 0u16;
        while pos < datagram.len() {
            let byte = datagram[pos];
            pos += 1;
            if byte == PAYLOAD_MARKER {
                if pos == datagram.len() {
                    return Err(CoapError::Protocol(
                        "payload marker followed by no payload".to_string(),
                    ));
                }
                msg.payload = Bytes::copy_from_slice(&datagram[pos..]);
                break;
            }

            let delta = read_extended(byte >> 4, datagram, &mut pos)?;
            let len = read_extended(byte & 0x0f, datagram, &mut pos)?;
            number = u16::try_from(number as usize + delta)
                .map_err(|_| CoapError::Protocol("option number overflow".to_string()))?;
            let value = take(datagram, &mut pos, len)?;
            msg.options.push((number, value));
        }

        let has_content =
            !msg.token.is_empty() || !msg.options.is_empty() || !msg.payload.is_empty();
        if msg.is_empty() && has_content {
            return Err(CoapError::Protocol("empty message with content".to_string()));
        }
        Ok(msg)
    }

    /// Header fields only: type, code, message id and token length.
    ///
    /// Lets the server reset a confirmable message it cannot otherwise parse.
    pub fn decode_header(datagram: &[u8]) -> CoapResult<(MessageType, u8, u16, usize)> {
        if datagram.len() < 4 {
            return Err(CoapError::Truncated);
        }
        let version = datagram[0] >> 6;
        if version != VERSION {
            return Err(CoapError::UnsupportedVersion(version));
        }
        Ok((
            MessageType::from_bits(datagram[0] >> 4),
            datagram[1],
            u16::from_be_bytes([datagram[2], datagram[3]]),
            (datagram[0] & 0x0f) as usize,
        ))
    }
}

fn take(datagram: &[u8], pos: &mut usize, len: usize) -> CoapResult<Bytes> {
    let end = pos.checked_add(len).ok_or(CoapError::Truncated)?;
    let slice = datagram.get(*pos..end).ok_or(CoapError::Truncated)?;
    *pos = end;
    Ok(Bytes::copy_from_slice(slice))
}

fn read_extended(nibble: u8, datagram: &[u8], pos: &mut usize) -> CoapResult<usize> {
    match nibble {
        0..=12 => Ok(nibble as usize),
        13 => {
            let ext = take(datagram, pos, 1)?;
            Ok(ext[0] as usize + 13)
        }
        14 => {
            let ext = take(datagram, pos, 2)?;
            Ok(u16::from_be_bytes([ext[0], ext[1]]) as usize + 269)
        }
        _ => Err(CoapError::Protocol("reserved option nibble 15".to_string())),
    }
}

fn extended(value: usize) -> CoapResult<(u8, Vec<u8>)> {
    match value {
        0..=12 => Ok((value as u8, Vec::new())),
        13..=268 => Ok((13, vec![(value - 13) as u8])),
        269..=65804 => Ok((14, ((value - 269) as u16).to_be_bytes().to_vec())),
        _ => Err(CoapError::Protocol(format!("option field {} too large", value))),
    }
}

/// Minimal big-endian unsigned integer; zero encodes as no bytes
pub fn encode_uint(value: u32) -> Bytes {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    Bytes::copy_from_slice(&bytes[skip..])
}

pub fn decode_uint(value: &[u8]) -> u32 {
    value
        .iter()
        .take(4)
        .fold(0u32, |acc, b| acc << 8 | *b as u32)
}
