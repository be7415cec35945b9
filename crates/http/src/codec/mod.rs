//! HTTP codec module for encoding and decoding HTTP messages
//!
//! This module provides functionality for streaming HTTP message processing,
//! including request decoding and response encoding. It uses a state machine
//! pattern to handle both headers and payload data.
//!
//! # Architecture
//!
//! - Request handling:
//!   - [`RequestDecoder`]: Decodes incoming HTTP requests for `FramedRead`
//!   - [`TransferDecoder`]: Frames one request body from byte slices pushed by the caller
//!   - Header parsing via the `header` module
//!   - Payload decoding via the `body` module
//!
//! - Response handling:
//!   - [`ResponseEncoder`]: Encodes outgoing HTTP responses
//!
//! # Example
//!
//! ```
//! use ferry_http::codec::{BodyEvent, TransferDecoder};
//! use ferry_http::protocol::PayloadSize;
//!
//! let mut decoder = TransferDecoder::new(PayloadSize::Chunked);
//! assert!(matches!(decoder.feed(b"5\r\nhel"), BodyEvent::Data(_)));
//! assert!(matches!(decoder.feed(b"lo\r\n0\r\n\r\n"), BodyEvent::Data(_)));
//! assert!(matches!(decoder.next_event(), BodyEvent::Complete { reusable: true }));
//! ```

mod body;
mod header;
mod request_decoder;
mod response_encoder;

pub use body::{
    BodyEvent, ChunkedDecoder, ChunkedEncoder, LengthDecoder, LengthEncoder, PayloadDecoder, PayloadEncoder,
    TransferDecoder,
};
pub use header::{HeaderDecoder, HeaderEncoder, MAX_HEADER_BYTES, MAX_HEADER_NUM, MAX_TRAILER_BYTES, MAX_TRAILER_NUM};
pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
