//! Translation between CoAP messages and the transport-neutral LDP messages

use super::message::{option, CoapError, CoapResult, Message, MessageType};
use crate::ldp::{LdpRequest, LdpResponse};
use crate::vocab::{RequestCode, ResponseCode};
use percent_encoding::percent_decode;

/// Outcome of reading a request message
#[derive(Debug)]
pub enum Incoming {
    Request(LdpRequest),
    /// Request class code outside GET..OPTIONS
    UnknownMethod(u8),
}

pub fn decode_request(msg: &Message) -> CoapResult<Incoming> {
    let method = match RequestCode::try_from(msg.code) {
        Ok(method) => method,
        Err(_) => return Ok(Incoming::UnknownMethod(msg.code)),
    };

    let segments = msg
        .option_values(option::URI_PATH)
        .map(|v| utf8(v, "Uri-Path"))
        .collect::<CoapResult<Vec<_>>>()?;
    let mut req = LdpRequest::new(method, &segments.join("/"));

    for raw in msg.option_values(option::URI_QUERY) {
        let decoded = percent_decode(raw)
            .decode_utf8()
            .map_err(|e| CoapError::Protocol(format!("Uri-Query is not UTF-8: {}", e)))?;
        let (name, value) = decoded.split_once('=').unwrap_or((decoded.as_ref(), ""));
        req = req.with_query(name, value);
    }

    req.content_format = msg
        .uint_option(option::CONTENT_FORMAT)
        .map(to_format)
        .transpose()?;
    req.accept = msg.uint_option(option::ACCEPT).map(to_format).transpose()?;
    req.if_match = msg.option_values(option::IF_MATCH).map(|v| v.to_vec()).collect();
    req.payload = msg.payload.clone();
    Ok(Incoming::Request(req))
}

/// Build the reply to `request`.
///
/// Confirmable requests get a piggybacked acknowledgement carrying the same
/// message id; non-confirmable requests get a non-confirmable reply with
/// `message_id`.
pub fn encode_response(request: &Message, res: &LdpResponse, message_id: u16) -> Message {
    let mut reply =
        reply_to(request, res.code.value(), message_id).with_payload(res.payload.clone());

    if let Some(etag) = &res.etag {
        reply.add_option(option::ETAG, etag.clone());
    }
    if let Some(location) = &res.location {
        for segment in uri_path(location).split('/').filter(|s| !s.is_empty()) {
            reply.add_string_option(option::LOCATION_PATH, segment);
        }
    }
    if let Some(format) = res.content_format {
        reply.add_uint_option(option::CONTENT_FORMAT, format as u32);
    }
    if let Some(query) = &res.location_query {
        for attribute in query.split('&').filter(|s| !s.is_empty()) {
            reply.add_string_option(option::LOCATION_QUERY, attribute);
        }
    }
    reply
}

/// Bare response carrying only a code
pub fn status(request: &Message, code: ResponseCode, message_id: u16) -> Message {
    reply_to(request, code.value(), message_id)
}

/// Reset for a confirmable message the server will not process
pub fn reset(message_id: u16) -> Message {
    Message::new(MessageType::Reset, 0, message_id)
}

fn reply_to(request: &Message, code: u8, message_id: u16) -> Message {
    let (message_type, id) = match request.message_type {
        MessageType::Confirmable => (MessageType::Acknowledgement, request.message_id),
        _ => (MessageType::NonConfirmable, message_id),
    };
    Message::new(message_type, code, id).with_token(request.token.clone())
}

fn utf8(value: &[u8], name: &str) -> CoapResult<String> {
    String::from_utf8(value.to_vec())
        .map_err(|e| CoapError::Protocol(format!("{} is not UTF-8: {}", name, e)))
}

fn to_format(value: u32) -> CoapResult<u16> {
    u16::try_from(value)
        .map_err(|_| CoapError::Protocol(format!("content format {} out of range", value)))
}

/// Path component of an absolute URI, e.g. `/c/a` for `coap://host:5683/c/a`
fn uri_path(uri: &str) -> &str {
    let rest = match uri.find("://") {
        Some(idx) => &uri[idx + 3..],
        None => uri,
    };
    let path = match rest.find('/') {
        Some(idx) => &rest[idx..],
        None => "",
    };
    path.split(['?', '#']).next().unwrap_or_default()
}
