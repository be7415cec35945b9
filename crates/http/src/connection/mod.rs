//! HTTP connection handling module
//!
//! - [`HttpConnection`]: serves the requests of one transport connection in order, with
//!   keep-alive, `Expect: 100-continue` and draining of unread request bodies
//! - [`ConnectionId`]: the identity shared by every request of one connection

mod http_connection;
mod identity;

pub use http_connection::HttpConnection;
pub use identity::ConnectionId;
