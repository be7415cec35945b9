//! Non-blocking HTTP/1.1 request ingestion
//!
//! `ferry-http` turns a byte stream that arrives in arbitrary fragments into requests whose
//! bodies are framed exactly, so a connection can carry any number of requests one after
//! another. It covers the parts of a server that sit between the socket and the handler.
//!
//! # Features
//!
//! - Request bodies framed by `Content-Length` or by `Transfer-Encoding: chunked`,
//!   including chunk extensions and trailer fields
//! - Streaming `multipart/*` decoding with a callback per part
//! - Persistent connections with a stable identity shared by every request they carry
//! - Expect-continue mechanism
//! - Streaming responses, chunked whenever the length is not known up front
//!
//! # Example
//!
//! ```no_run
//! use std::error::Error;
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use ferry_http::connection::{ConnectionId, HttpConnection};
//! use ferry_http::handler::make_handler;
//! use ferry_http::protocol::body::ReqBody;
//! use http::{Request, Response};
//! use http_body_util::{BodyExt, Full};
//! use tokio::net::TcpListener;
//! use tracing::{error, info, warn};
//!
//! #[tokio::main]
//! async fn main() {
//!     let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
//!         Ok(tcp_listener) => tcp_listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!
//!     let handler = Arc::new(make_handler(echo));
//!
//!     loop {
//!         let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
//!             Ok(stream_and_addr) => stream_and_addr,
//!             Err(e) => {
//!                 warn!(cause = %e, "failed to accept");
//!                 continue;
//!             }
//!         };
//!
//!         let handler = handler.clone();
//!         tokio::spawn(async move {
//!             let (reader, writer) = tcp_stream.into_split();
//!             let connection = HttpConnection::new(reader, writer);
//!             if let Err(e) = connection.process(handler).await {
//!                 error!(cause = %e, "connection shutdown with error");
//!             }
//!         });
//!     }
//! }
//!
//! async fn echo(request: Request<ReqBody>) -> Result<Response<Full<Bytes>>, Box<dyn Error + Send + Sync>> {
//!     if let Some(connection) = request.extensions().get::<ConnectionId>() {
//!         info!(connection = connection.id(), path = request.uri().path(), "serving request");
//!     }
//!
//!     let body = request.into_body().collect().await?.to_bytes();
//!     Ok(Response::new(Full::new(body)))
//! }
//! ```
//!
//! # Architecture
//!
//! - [`codec`]: head parsing and the body framing state machines, as `tokio_util` codecs
//!   and as the push-style [`codec::TransferDecoder`]
//! - [`connection`]: the per-connection request loop and [`connection::ConnectionId`]
//! - [`handler`]: the [`handler::Handler`] trait and [`handler::make_handler`]
//! - [`multipart`]: boundary scanning and part dispatch for `multipart/*` bodies
//! - [`protocol`]: message types, request heads, the streaming request body and errors
//!
//! # Errors
//!
//! - [`protocol::HttpError`]: why a connection stopped
//! - [`protocol::ParseError`]: the request head or body can't be framed
//! - [`protocol::SendError`]: the response can't be written
//! - [`multipart::MultipartError`]: the multipart body is malformed
//!
//! # Limitations
//!
//! - HTTP/1.0 and HTTP/1.1 only
//! - No TLS support
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64

pub mod codec;
pub mod connection;
pub mod handler;
pub mod multipart;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
