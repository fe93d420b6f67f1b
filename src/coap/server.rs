//! CoAP server over UDP
//!
//! One task per datagram. Confirmable requests are answered with a
//! piggybacked acknowledgement, non-confirmable ones with a non-confirmable
//! response. Acknowledgements and resets from clients are ignored since the
//! server never sends separate responses.

use super::exchange::{decode_request, encode_response, reset, status, Incoming};
use super::message::{CoapResult, Message, MessageType};
use crate::config::ServerConfig;
use crate::ldp::{LdpError, LdpResponse, ResourceTree};
use crate::vocab::ResponseCode;
use bytes::Bytes;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};

/// LDP-CoAP server
pub struct CoapServer {
    /// Bind address, `host:port`
    address: String,
    max_message_size: usize,
    tree: Arc<ResourceTree>,
    next_message_id: Arc<AtomicU16>,
}

impl CoapServer {
    pub fn new(config: &ServerConfig, tree: Arc<ResourceTree>) -> Self {
        Self {
            address: config.bind_address(),
            max_message_size: config.max_message_size,
            tree,
            next_message_id: Arc::new(AtomicU16::new(rand_seed())),
        }
    }

    pub fn tree(&self) -> &Arc<ResourceTree> {
        &self.tree
    }

    /// Bind the configured address and serve until an I/O error
    pub async fn start(&self) -> CoapResult<()> {
        let socket = UdpSocket::bind(&self.address).await?;
        info!("LDP-CoAP server listening on {}", socket.local_addr()?);
        self.serve(Arc::new(socket)).await
    }

    /// Serve requests arriving on an already bound socket
    pub async fn serve(&self, socket: Arc<UdpSocket>) -> CoapResult<()> {
        // One spare byte tells an oversized datagram from one that fits exactly
        let mut buf = vec![0u8; self.max_message_size + 1];

        loop {
            let (n, peer) = socket.recv_from(&mut buf).await?;
            let datagram = Bytes::copy_from_slice(&buf[..n]);
            debug!("{} bytes from {}", n, peer);

            let socket = Arc::clone(&socket);
            let tree = Arc::clone(&self.tree);
            let ids = Arc::clone(&self.next_message_id);
            let max = self.max_message_size;

            tokio::spawn(async move {
                let Some(reply) = handle_datagram(&datagram, &tree, &ids, max).await else {
                    return;
                };
                let bytes = match reply.to_bytes() {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        error!("Failed to encode reply to {}: {}", peer, e);
                        return;
                    }
                };
                if bytes.len() > max {
                    warn!("Reply to {} is {} bytes, above {}", peer, bytes.len(), max);
                }
                if let Err(e) = socket.send_to(&bytes, peer).await {
                    error!("Failed to reply to {}: {}", peer, e);
                }
            });
        }
    }
}

/// Process one datagram, returning the message to send back, if any
pub async fn handle_datagram(
    datagram: &[u8],
    tree: &ResourceTree,
    ids: &AtomicU16,
    max_message_size: usize,
) -> Option<Message> {
    let next_id = || ids.fetch_add(1, Ordering::Relaxed);

    if datagram.len() > max_message_size {
        let (message_type, code, message_id, tkl) = Message::decode_header(datagram).ok()?;
        let is_request = matches!(
            message_type,
            MessageType::Confirmable | MessageType::NonConfirmable
        );
        if !is_request || code >> 5 != 0 {
            return None;
        }
        warn!("Dropping request of more than {} bytes", max_message_size);
        let token = datagram.get(4..4 + tkl.min(8)).unwrap_or_default().to_vec();
        let request = Message::new(message_type, code, message_id).with_token(token);
        return Some(status(&request, ResponseCode::RequestEntityTooLarge, next_id()));
    }

    let msg = match Message::decode(datagram) {
        Ok(msg) => msg,
        Err(e) => {
            debug!("Malformed datagram: {}", e);
            return match Message::decode_header(datagram) {
                Ok((MessageType::Confirmable, _, message_id, _)) => Some(reset(message_id)),
                _ => None,
            };
        }
    };

    match msg.message_type {
        MessageType::Acknowledgement | MessageType::Reset => return None,
        MessageType::Confirmable | MessageType::NonConfirmable => {}
    }

    // Ping, or a response sent to the server
    if msg.is_empty() || msg.code >> 5 != 0 {
        return (msg.message_type == MessageType::Confirmable).then(|| reset(msg.message_id));
    }

    let response = match decode_request(&msg) {
        Ok(Incoming::Request(req)) => tree.handle(req).await,
        Ok(Incoming::UnknownMethod(code)) => {
            debug!("Unknown method code 0.{:02}", code);
            return Some(status(&msg, ResponseCode::MethodNotAllowed, next_id()));
        }
        Err(e) => LdpResponse::from_error(&LdpError::BadRequest(e.to_string())),
    };
    Some(encode_response(&msg, &response, next_id()))
}

/// Initial message id, varied per process so restarts do not reuse ids
fn rand_seed() -> u16 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    (nanos ^ std::process::id()) as u16
}
