//! Transport-neutral request and response

use super::{LdpError, LdpResult};
use crate::vocab::{media, RequestCode, ResponseCode};
use bytes::Bytes;
use sha2::{Digest, Sha256};

/// Decoded request against one resource path
#[derive(Debug, Clone, PartialEq)]
pub struct LdpRequest {
    pub method: RequestCode,
    /// `""` for the root, otherwise `/seg/seg`
    pub path: String,
    /// Query attributes in arrival order
    pub query: Vec<(String, String)>,
    pub content_format: Option<u16>,
    pub accept: Option<u16>,
    pub if_match: Vec<Vec<u8>>,
    pub payload: Bytes,
}

impl LdpRequest {
    pub fn new(method: RequestCode, path: &str) -> Self {
        let path: String = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| format!("/{}", s))
            .collect();
        Self {
            method,
            path,
            query: Vec::new(),
            content_format: None,
            accept: None,
            if_match: Vec::new(),
            payload: Bytes::new(),
        }
    }

    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_content_format(mut self, content_format: u16) -> Self {
        self.content_format = Some(content_format);
        self
    }

    pub fn with_accept(mut self, accept: u16) -> Self {
        self.accept = Some(accept);
        self
    }

    pub fn with_if_match(mut self, etag: Vec<u8>) -> Self {
        self.if_match.push(etag);
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    /// First value of a query attribute
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a query attribute, in arrival order
    pub fn attributes<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a str> + 'n
    where
        'a: 'n,
    {
        self.query
            .iter()
            .filter(move |(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Payload as UTF-8 text
    pub fn text(&self) -> LdpResult<&str> {
        std::str::from_utf8(&self.payload)
            .map_err(|e| LdpError::BadRequest(format!("payload is not UTF-8: {}", e)))
    }

    /// Parent path and last segment, `None` for the root
    pub fn split_last(&self) -> Option<(&str, &str)> {
        let idx = self.path.rfind('/')?;
        Some((&self.path[..idx], &self.path[idx + 1..]))
    }
}

/// Response produced by the resource tree
#[derive(Debug, Clone, PartialEq)]
pub struct LdpResponse {
    pub code: ResponseCode,
    pub content_format: Option<u16>,
    pub payload: Bytes,
    /// Absolute URI of a created resource
    pub location: Option<String>,
    /// Link-format attributes, e.g. `rt=ldp:BasicContainer`
    pub location_query: Option<String>,
    pub etag: Option<Vec<u8>>,
}

impl LdpResponse {
    pub fn new(code: ResponseCode) -> Self {
        Self {
            code,
            content_format: None,
            payload: Bytes::new(),
            location: None,
            location_query: None,
            etag: None,
        }
    }

    pub fn with_payload(mut self, content_format: u16, payload: impl Into<Bytes>) -> Self {
        self.content_format = Some(content_format);
        self.payload = payload.into();
        self
    }

    pub fn with_location(mut self, uri: &str, query: String) -> Self {
        self.location = Some(uri.to_string());
        self.location_query = Some(query);
        self
    }

    pub fn with_etag(mut self) -> Self {
        self.etag = Some(etag(&self.payload));
        self
    }

    /// Diagnostic response: error code plus the message as text/plain
    pub fn from_error(err: &LdpError) -> Self {
        Self::new(err.code()).with_payload(media::TEXT_PLAIN, err.to_string())
    }
}

/// Entity tag: the first 8 bytes of the SHA-256 of a representation
pub fn etag(payload: &[u8]) -> Vec<u8> {
    Sha256::digest(payload)[..8].to_vec()
}
