//! Core HTTP protocol types shared by the codecs and the connection loop.
//!
//! - **Message Handling** ([`message`]): [`Message`] carries either a head or a
//!   [`PayloadItem`]. [`PayloadSize`] says how a payload is delimited.
//! - **Request Processing** ([`request`]): [`RequestHeader`] wraps the parsed head and
//!   decides body framing and keep-alive.
//! - **Response Processing** ([`response`]): [`ResponseHead`].
//! - **Body Streaming** ([`body`]): [`body::ReqBody`] hands the decoded body to handlers.
//! - **Error Handling** ([`error`]): [`HttpError`], [`ParseError`], [`SendError`].

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHeader;

mod response;
pub use response::ResponseHead;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

pub mod body;
