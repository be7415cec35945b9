//! Request body streaming.
//!
//! The connection owns the decoded payload stream. Handlers get a [`ReqBody`], which pulls
//! items from that stream through a [`ReqBodySender`] running on the same task:
//!
//! - [`ReqBody`] implements `http_body::Body` and yields data frames, then a trailers
//!   frame when the client sent trailers.
//! - [`ReqBodySender`] answers each pull with the next payload item, and drains whatever
//!   the handler left unread once the handler is done, so the next request on the
//!   connection starts at the right byte.

mod req_body;

pub use req_body::ReqBody;
pub use req_body::ReqBodySender;
