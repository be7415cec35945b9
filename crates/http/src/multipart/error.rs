use thiserror::Error;

/// Errors raised while decoding a multipart body.
///
/// These fail the request that carried the body, the connection itself stays usable as long
/// as the transfer coding underneath was intact.
#[derive(Debug, Error)]
pub enum MultipartError {
    #[error("incomplete multipart body, expected {expected}")]
    Incomplete { expected: &'static str },

    #[error("invalid part header: {reason}")]
    InvalidHeader { reason: String },

    #[error("part header section exceeds the limit {max_size}")]
    HeaderTooLarge { max_size: usize },

    #[error("invalid boundary: {reason}")]
    InvalidBoundary { reason: String },

    #[error("multipart boundary not found in content-type")]
    MissingBoundary,

    #[error("content-type is not multipart")]
    NotMultipart,

    #[error("failed to read multipart body: {reason}")]
    Body { reason: String },
}

impl MultipartError {
    pub fn incomplete(expected: &'static str) -> Self {
        Self::Incomplete { expected }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_boundary<S: ToString>(str: S) -> Self {
        Self::InvalidBoundary { reason: str.to_string() }
    }

    pub fn body<S: ToString>(str: S) -> Self {
        Self::Body { reason: str.to_string() }
    }
}
