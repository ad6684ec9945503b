//! Outbound response produced by services and by the dispatcher itself.
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use thiserror::Error;

/// MIME type used when a response does not name one.
pub const DEFAULT_MIMETYPE: &str = "text/plain";

/// Error type for turning a [`ServiceResponse`] into an HTTP response
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ResponseError {
    #[error("Invalid MIME type '{0}'")]
    InvalidMimetype(String),

    #[error("Failed to build HTTP response: {0}")]
    Http(#[from] http::Error),
}

/// Body, MIME type and status of an HTTP response, plus any extra headers.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceResponse {
    body: Bytes,
    mimetype: Option<String>,
    status: StatusCode,
    headers: HeaderMap,
}

impl ServiceResponse {
    /// A `200 OK` response with no explicit MIME type.
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            mimetype: None,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
        }
    }

    /// Built-in answer for requests no service is registered for.
    pub fn not_found() -> Self {
        Self::new("not found")
            .with_mimetype(DEFAULT_MIMETYPE)
            .with_status(StatusCode::NOT_FOUND)
    }

    /// Built-in answer for a handler failure outside debug mode.
    pub fn internal_error() -> Self {
        Self::new("internal error").with_status(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_mimetype(mut self, mimetype: impl Into<String>) -> Self {
        self.mimetype = Some(mimetype.into());
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn mimetype(&self) -> Option<&str> {
        self.mimetype.as_deref()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Convert into an `http::Response`, filling in `Content-Type` from the
    /// MIME type (or [`DEFAULT_MIMETYPE`]) and `Content-Length` from the body.
    pub fn into_http(self) -> Result<http::Response<Bytes>, ResponseError> {
        let mimetype = self.mimetype.as_deref().unwrap_or(DEFAULT_MIMETYPE);
        let content_type = HeaderValue::from_str(mimetype)
            .map_err(|_| ResponseError::InvalidMimetype(mimetype.to_string()))?;

        let mut builder = http::Response::builder()
            .status(self.status)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, self.body.len());
        if let Some(headers) = builder.headers_mut() {
            headers.extend(self.headers);
        }
        Ok(builder.body(self.body)?)
    }
}
