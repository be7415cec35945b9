//! HTTP response head.

use http::Response;

/// The head of a response: status, version and headers with the body left out.
///
/// The connection layer decides the body framing separately and hands the
/// head to the encoder together with a [`PayloadSize`](crate::protocol::PayloadSize).
pub type ResponseHead = Response<()>;
