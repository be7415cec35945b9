//! HTTP header processing module for encoding and decoding headers
//!
//! - [`HeaderDecoder`]: decodes request heads, enforcing the size and count limits
//! - [`parse_trailers`]: decodes the trailer section of a chunked body
//! - [`HeaderEncoder`]: writes the status line and response headers, with the framing
//!   header that matches the payload size

mod header_decoder;
mod header_encoder;

pub use header_decoder::{HeaderDecoder, MAX_HEADER_BYTES, MAX_HEADER_NUM, MAX_TRAILER_BYTES, MAX_TRAILER_NUM, parse_trailers};
pub use header_encoder::HeaderEncoder;
