//! Inbound request as seen by services.
use std::{borrow::Cow, net::SocketAddr};

use bytes::Bytes;
use http::{HeaderMap, Method, Uri, request::Parts};

/// A fully buffered HTTP request.
///
/// `path` is the percent-decoded request path, which is what routing and
/// services work with. The raw URI stays available for services that need
/// the original encoding or the query string.
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    method: Method,
    uri: Uri,
    path: String,
    headers: HeaderMap,
    body: Bytes,
    remote_addr: Option<SocketAddr>,
}

impl ServiceRequest {
    pub fn new(parts: Parts, body: Bytes, remote_addr: Option<SocketAddr>) -> Self {
        let path = decode_path(parts.uri.path()).into_owned();
        Self {
            method: parts.method,
            uri: parts.uri,
            path,
            headers: parts.headers,
            body,
            remote_addr,
        }
    }

    /// Build a bodiless GET request for `uri`. Mostly useful in tests and
    /// for internal sub-requests.
    pub fn get(uri: &str) -> eyre::Result<Self> {
        let (parts, ()) = http::Request::get(uri).body(())?.into_parts();
        Ok(Self::new(parts, Bytes::new(), None))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Decoded request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path exactly as it appeared on the request line.
    pub fn raw_path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }
}

/// Percent-decode a request path, keeping the raw form if the result would
/// not be valid UTF-8.
pub fn decode_path(raw: &str) -> Cow<'_, str> {
    urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw))
}
