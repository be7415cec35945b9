//! HTTP request header handling.
//!
//! [`RequestHeader`] wraps `http::Request<()>` and adds what the connection layer needs to
//! frame the exchange: how the body is delimited and whether the connection may be reused.

use http::header::{CONNECTION, CONTENT_LENGTH, TRANSFER_ENCODING};
use http::request::Parts;
use http::{HeaderMap, HeaderValue, Method, Request, Uri, Version};

use crate::protocol::{ParseError, PayloadSize};

/// The head of an HTTP request, before a body is attached.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl AsMut<Request<()>> for RequestHeader {
    fn as_mut(&mut self) -> &mut Request<()> {
        &mut self.inner
    }
}

impl RequestHeader {
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    /// Attaches a body to this header, converting it into a full `Request<T>`.
    pub fn body<T>(self, body: T) -> Request<T> {
        self.inner.map(|_| body)
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Whether the client allows the connection to carry another request after this one.
    ///
    /// HTTP/1.1 is persistent unless `Connection: close` is present, HTTP/1.0 only when
    /// the client asked for `Connection: keep-alive`.
    pub fn keep_alive(&self) -> bool {
        let connection = self.headers().get_all(CONNECTION);
        match self.version() {
            Version::HTTP_11 => !connection.iter().any(|value| has_token(value, "close")),
            Version::HTTP_10 => connection.iter().any(|value| has_token(value, "keep-alive")),
            _ => false,
        }
    }

    /// Determines how the request body is delimited.
    ///
    /// refer: <https://www.rfc-editor.org/rfc/rfc9112.html#name-message-body-length>
    pub fn payload_size(&self) -> Result<PayloadSize, ParseError> {
        let headers = self.headers();
        let has_te = headers.contains_key(TRANSFER_ENCODING);
        let has_cl = headers.contains_key(CONTENT_LENGTH);

        match (has_te, has_cl) {
            (false, false) => Ok(PayloadSize::new_empty()),

            (true, false) => {
                if is_chunked(headers) {
                    Ok(PayloadSize::new_chunked())
                } else {
                    Err(ParseError::invalid_body("transfer-encoding present but chunked is not the final coding"))
                }
            }

            (false, true) => content_length(headers).map(PayloadSize::new_length),

            (true, true) => {
                Err(ParseError::invalid_content_length("transfer_encoding and content_length both present in headers"))
            }
        }
    }
}

/// Checks whether chunked is the final coding across every Transfer-Encoding line.
fn is_chunked(headers: &HeaderMap) -> bool {
    const CHUNKED: &[u8] = b"chunked";
    headers
        .get_all(TRANSFER_ENCODING)
        .iter()
        .next_back()
        .and_then(|value| value.as_bytes().rsplit(|b| *b == b',').next())
        .is_some_and(|last| last.trim_ascii().eq_ignore_ascii_case(CHUNKED))
}

/// Reads Content-Length, accepting repeated lines only when they all agree.
fn content_length(headers: &HeaderMap) -> Result<u64, ParseError> {
    let mut length = None;
    for value in headers.get_all(CONTENT_LENGTH) {
        let cl_str = value.to_str().map_err(|_| ParseError::invalid_content_length("value can't to_str"))?;
        for item in cl_str.split(',') {
            let parsed = item
                .trim()
                .parse::<u64>()
                .map_err(|_| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))?;

            match length {
                Some(previous) if previous != parsed => {
                    return Err(ParseError::invalid_content_length(format!("conflicting values {previous} and {parsed}")));
                }
                _ => length = Some(parsed),
            }
        }
    }
    length.ok_or_else(|| ParseError::invalid_content_length("empty value"))
}

fn has_token(value: &HeaderValue, token: &str) -> bool {
    value.as_bytes().split(|b| *b == b',').any(|item| item.trim_ascii().eq_ignore_ascii_case(token.as_bytes()))
}

impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}
