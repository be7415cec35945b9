//! Push-style decoding of one request body.
//!
//! [`TransferDecoder`] drives the same state machines as [`PayloadDecoder`] but is fed plain
//! byte slices, for callers that own their event loop instead of a `FramedRead`.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http::HeaderMap;
use tokio_util::codec::Decoder;
use tracing::{trace, warn};

use crate::codec::body::PayloadDecoder;
use crate::protocol::{ParseError, PayloadItem, PayloadSize, RequestHeader};

/// One step of progress reported by [`TransferDecoder`].
#[derive(Debug, Clone)]
pub enum BodyEvent {
    /// Everything fed so far has been consumed, feed more bytes
    NeedMore,
    /// Unchunked body bytes, in wire order
    Data(Bytes),
    /// Trailer fields that followed the last chunk
    Trailers(HeaderMap),
    /// The body ended exactly where its framing said it would
    Complete { reusable: bool },
    /// The body can't be framed, the connection must not be reused
    Malformed(Arc<ParseError>),
}

impl BodyEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BodyEvent::Complete { .. } | BodyEvent::Malformed(_))
    }
}

#[derive(Debug)]
enum Progress {
    Decoding,
    Complete,
    Failed(Arc<ParseError>),
}

/// Frames one request body out of a byte stream delivered in arbitrary fragments.
///
/// Bytes fed after the body ended are kept untouched, they belong to the next request on
/// the connection and can be taken back with [`TransferDecoder::into_remaining`].
#[derive(Debug)]
pub struct TransferDecoder {
    decoder: PayloadDecoder,
    buffer: BytesMut,
    progress: Progress,
    keep_alive: bool,
    stream_ended: bool,
}

impl TransferDecoder {
    pub fn new(payload_size: PayloadSize) -> Self {
        Self {
            decoder: PayloadDecoder::from(payload_size),
            buffer: BytesMut::new(),
            progress: Progress::Decoding,
            keep_alive: true,
            stream_ended: false,
        }
    }

    /// Selects the framing from the request head.
    ///
    /// `Complete` will only report the connection reusable if the head allows it.
    pub fn for_request(header: &RequestHeader) -> Result<Self, ParseError> {
        let mut decoder = Self::new(header.payload_size()?);
        decoder.keep_alive = header.keep_alive();
        Ok(decoder)
    }

    /// Appends `bytes` and returns the first event they produce.
    ///
    /// One call yields at most one event, use [`TransferDecoder::next_event`] until it
    /// returns `NeedMore` to drain the rest.
    pub fn feed(&mut self, bytes: &[u8]) -> BodyEvent {
        self.buffer.extend_from_slice(bytes);
        self.next_event()
    }

    /// Returns the next event from bytes already fed.
    pub fn next_event(&mut self) -> BodyEvent {
        match &self.progress {
            Progress::Complete => return BodyEvent::Complete { reusable: self.keep_alive },
            Progress::Failed(e) => return BodyEvent::Malformed(e.clone()),
            Progress::Decoding => {}
        }

        let decoded = if self.stream_ended {
            self.decoder.decode_eof(&mut self.buffer)
        } else {
            self.decoder.decode(&mut self.buffer)
        };

        match decoded {
            Ok(Some(PayloadItem::Chunk(bytes))) => BodyEvent::Data(bytes),
            Ok(Some(PayloadItem::Trailers(trailers))) => BodyEvent::Trailers(trailers),
            Ok(Some(PayloadItem::Eof)) => {
                trace!(pipelined = self.buffer.len(), "request body complete");
                self.progress = Progress::Complete;
                BodyEvent::Complete { reusable: self.keep_alive }
            }
            Ok(None) => BodyEvent::NeedMore,
            Err(e) => {
                warn!(cause = %e, "request body malformed");
                let e = Arc::new(e);
                self.progress = Progress::Failed(e.clone());
                BodyEvent::Malformed(e)
            }
        }
    }

    /// Signals that the transport delivered its last byte.
    ///
    /// Events still buffered are returned first. Once they run out, a body that hasn't
    /// finished turns into `Malformed`.
    pub fn end_of_stream(&mut self) -> BodyEvent {
        self.stream_ended = true;
        self.next_event()
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.progress, Progress::Complete)
    }

    /// Bytes fed but not consumed by the body.
    pub fn remaining(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_remaining(self) -> BytesMut {
        self.buffer
    }
}
