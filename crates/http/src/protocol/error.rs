use std::io;
use thiserror::Error;

/// Outcome of a connection that could not finish cleanly.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },

    #[error("connection {id} already signaled close and can't serve another exchange")]
    ConnectionClosed { id: u64 },

    #[error("request on connection {expected} resolved to the identity of connection {found}")]
    IdentityMismatch { expected: u64, found: u64 },
}

/// Framing and request head errors.
///
/// Every variant is fatal to the connection: once the byte stream can't be framed
/// there is no way to find where the next request starts.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid http uri")]
    InvalidUri,

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid chunk: {reason}")]
    InvalidChunk { reason: String },

    #[error("incomplete body: {reason}")]
    IncompleteBody { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn invalid_chunk<S: ToString>(str: S) -> Self {
        Self::InvalidChunk { reason: str.to_string() }
    }

    pub fn incomplete_body<S: ToString>(str: S) -> Self {
        Self::IncompleteBody { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// Whether the error came from body framing rather than the request head.
    pub fn is_body_framing(&self) -> bool {
        matches!(self, Self::InvalidChunk { .. } | Self::IncompleteBody { .. } | Self::InvalidBody { .. })
    }
}

impl Clone for ParseError {
    /// `io::Error` isn't `Clone`, the copy keeps its kind and message.
    fn clone(&self) -> Self {
        match self {
            Self::TooLargeHeader { current_size, max_size } => Self::too_large_header(*current_size, *max_size),
            Self::TooManyHeaders { max_num } => Self::too_many_headers(*max_num),
            Self::InvalidHeader { reason } => Self::InvalidHeader { reason: reason.clone() },
            Self::InvalidVersion(version) => Self::InvalidVersion(*version),
            Self::InvalidMethod => Self::InvalidMethod,
            Self::InvalidUri => Self::InvalidUri,
            Self::InvalidContentLength { reason } => Self::InvalidContentLength { reason: reason.clone() },
            Self::InvalidChunk { reason } => Self::InvalidChunk { reason: reason.clone() },
            Self::IncompleteBody { reason } => Self::IncompleteBody { reason: reason.clone() },
            Self::InvalidBody { reason } => Self::InvalidBody { reason: reason.clone() },
            Self::Io { source } => Self::io(io::Error::new(source.kind(), source.to_string())),
        }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}
