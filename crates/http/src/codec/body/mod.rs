//! HTTP body handling module for processing request and response payloads
//!
//! This module provides functionality for encoding and decoding HTTP message bodies
//! using different transfer strategies. It supports both chunked transfer encoding
//! and content-length based transfers.
//!
//! # Components
//!
//! ## Decoders
//! - [`ChunkedDecoder`]: Handles chunked transfer encoded payloads, trailers included
//! - [`LengthDecoder`]: Processes fixed-length payloads
//! - [`PayloadDecoder`]: Main decoder that coordinates different decoding strategies
//! - [`TransferDecoder`]: Push-style front end fed with byte slices
//!
//! ## Encoders
//! - [`ChunkedEncoder`]: Implements chunked transfer encoding
//! - [`LengthEncoder`]: Handles fixed-length payload encoding
//! - [`PayloadEncoder`]: Main encoder that manages different encoding strategies

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;
mod transfer_decoder;

pub use chunked_decoder::ChunkedDecoder;
pub use chunked_encoder::ChunkedEncoder;
pub use length_decoder::LengthDecoder;
pub use length_encoder::LengthEncoder;
pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;
pub use transfer_decoder::{BodyEvent, TransferDecoder};
