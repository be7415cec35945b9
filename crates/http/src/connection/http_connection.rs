use std::error::Error;
use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;

use futures::{SinkExt, StreamExt};
use http::header::{CONNECTION, EXPECT};
use http::response::Parts;
use http::{HeaderValue, Response, StatusCode, Version};
use http_body::Body;
use http_body_util::{BodyExt, Empty, Full};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::select;

use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::connection::ConnectionId;
use crate::handler::Handler;
use crate::protocol::body::ReqBody;
use crate::protocol::{HttpError, Message, ParseError, PayloadItem, PayloadSize, RequestHeader, ResponseHead, SendError};

use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{error, info, warn};

/// Whether the connection carries another exchange after the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    KeepAlive,
    Close,
}

/// An HTTP connection that manages request processing and response streaming
///
/// `HttpConnection` handles the full lifecycle of an HTTP connection, including:
/// - Reading and decoding requests, one at a time even when they are pipelined
/// - Streaming request bodies to the handler and draining what it leaves unread
/// - Handling expect-continue mechanism
/// - Streaming responses back to clients
///
/// Every request carries the connection's [`ConnectionId`] in its extensions.
///
/// # Type Parameters
///
/// * `R`: The async readable stream type
/// * `W`: The async writable stream type
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
    identity: ConnectionId,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_identity(reader, writer, ConnectionId::new())
    }

    /// Serves the connection under an identity created by the caller.
    pub fn with_identity(reader: R, writer: W, identity: ConnectionId) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(), 8 * 1024),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
            identity,
        }
    }

    pub fn identity(&self) -> &ConnectionId {
        &self.identity
    }

    /// Serves requests until the peer goes away or one side asks to close.
    ///
    /// Returns an error when the byte stream can't be framed any more. The identity is
    /// closed whenever this returns.
    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler,
        H::RespBody: Body<Data = Bytes> + Unpin,
        <H::RespBody as Body>::Error: Display,
    {
        let result = self.serve(&handler).await;
        self.identity.close();
        result
    }

    async fn serve<H>(&mut self, handler: &Arc<H>) -> Result<(), HttpError>
    where
        H: Handler,
        H::RespBody: Body<Data = Bytes> + Unpin,
        <H::RespBody as Body>::Error: Display,
    {
        loop {
            match self.framed_read.next().await {
                Some(Ok(Message::Header((header, payload_size)))) => {
                    if self.do_process(header, payload_size, handler).await? == Flow::Close {
                        info!(connection = self.identity.id(), "connection close requested");
                        return Ok(());
                    }
                }

                Some(Ok(Message::Payload(_))) => {
                    error!(connection = self.identity.id(), "received payload while expecting a request head");
                    self.send_error_response(StatusCode::BAD_REQUEST).await;
                    return Err(ParseError::invalid_body("need header while receive body").into());
                }

                Some(Err(e)) => {
                    error!(connection = self.identity.id(), cause = %e, "can't receive next request");
                    self.send_error_response(StatusCode::BAD_REQUEST).await;
                    return Err(e.into());
                }

                None => {
                    info!(connection = self.identity.id(), "cant read more request, break this connection down");
                    return Ok(());
                }
            }
        }
    }

    async fn do_process<H>(
        &mut self,
        mut header: RequestHeader,
        payload_size: PayloadSize,
        handler: &Arc<H>,
    ) -> Result<Flow, HttpError>
    where
        H: Handler,
        H::RespBody: Body<Data = Bytes> + Unpin,
        <H::RespBody as Body>::Error: Display,
    {
        if let Err(e) = self.identity.begin_exchange() {
            error!(connection = self.identity.id(), "exchange attempted on a closed connection");
            self.send_error_response(StatusCode::INTERNAL_SERVER_ERROR).await;
            return Err(e);
        }

        let keep_alive = header.keep_alive();
        let version = header.version();

        // Check if the request header contains the "Expect: 100-continue" field.
        if let Some(value) = header.headers().get(EXPECT) {
            if value.as_bytes().eq_ignore_ascii_case(b"100-continue") {
                let writer = self.framed_write.get_mut();
                writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await.map_err(SendError::io)?;
                writer.flush().await.map_err(SendError::io)?;
                info!("receive expect request header, sent continue response");
            }
        }

        if let Err(e) = attach_identity(&mut header, &self.identity) {
            error!(connection = self.identity.id(), cause = %e, "request identity mismatch");
            self.identity.close();
            self.send_error_response(StatusCode::INTERNAL_SERVER_ERROR).await;
            return Err(e);
        }

        let (req_body, mut body_sender) = ReqBody::body_channel(&mut self.framed_read, payload_size);

        let request = header.body(req_body);

        // The handler and the body sender are polled together: the handler may wait for body
        // bytes that only the sender reads off the connection.
        let (response_result, body_result) = {
            tokio::pin! {
                let request_handle_future = handler.call(request);
                let body_sender_future = body_sender.send_body();
            }

            let mut body_done = false;
            let mut body_result = Ok(());

            let response = loop {
                select! {
                    biased;
                    response = &mut request_handle_future => {
                        break response;
                    }
                    result = &mut body_sender_future, if !body_done => {
                        body_done = true;
                        body_result = result;
                    }
                }
            };

            (response, body_result)
        };

        // skip body if request handler don't read body
        let body_result = match body_result {
            Ok(()) => body_sender.skip_body().await,
            Err(e) => Err(e),
        };

        if let Err(e) = body_result {
            error!(connection = self.identity.id(), cause = %e, "request body framing failed");
            self.send_error_response(StatusCode::BAD_REQUEST).await;
            return Err(e.into());
        }

        match response_result {
            Ok(response) => {
                let close = !keep_alive || wants_close(response.headers().get_all(CONNECTION));
                self.do_send_response(response, !close, version).await?;
                Ok(if close { Flow::Close } else { Flow::KeepAlive })
            }
            Err(e) => {
                let e: Box<dyn Error + Send + Sync> = e.into();
                error!(connection = self.identity.id(), cause = %e, "handle response error");
                let response = build_error_response(StatusCode::INTERNAL_SERVER_ERROR);
                self.do_send_response(response, keep_alive, version).await?;
                Ok(if keep_alive { Flow::KeepAlive } else { Flow::Close })
            }
        }
    }

    /// Best effort, the connection is being abandoned anyway.
    async fn send_error_response(&mut self, status_code: StatusCode) {
        if let Err(e) = self.do_send_response(build_error_response(status_code), false, Version::HTTP_11).await {
            warn!(connection = self.identity.id(), cause = %e, "failed to send error response");
        }
    }

    /// Writes `response` in a framing the client understands.
    ///
    /// HTTP/1.0 clients get an HTTP/1.0 status line and no chunked coding: a body of
    /// unknown length is buffered and sent with its `Content-Length`.
    async fn do_send_response<T>(
        &mut self,
        response: Response<T>,
        keep_alive: bool,
        version: Version,
    ) -> Result<(), HttpError>
    where
        T: Body + Unpin,
        T::Error: Display,
    {
        let (mut header_parts, body) = response.into_parts();

        if !keep_alive {
            header_parts.headers.insert(CONNECTION, HeaderValue::from_static("close"));
        }

        if version != Version::HTTP_10 {
            return self.write_response(header_parts, body).await;
        }

        header_parts.version = Version::HTTP_10;
        if keep_alive {
            header_parts.headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        }

        if body.size_hint().exact().is_some() {
            return self.write_response(header_parts, body).await;
        }

        let collected = body
            .collect()
            .await
            .map_err(|e| SendError::invalid_body(format!("resolve response body error: {e}")))?;
        if collected.trailers().is_some() {
            warn!(connection = self.identity.id(), "dropping response trailers for an HTTP/1.0 client");
        }
        self.write_response(header_parts, Full::new(collected.to_bytes())).await
    }

    async fn write_response<T>(&mut self, header_parts: Parts, mut body: T) -> Result<(), HttpError>
    where
        T: Body + Unpin,
        T::Error: Display,
    {
        // unknown length is sent chunked
        let payload_size = match body.size_hint().exact() {
            Some(0) => PayloadSize::Empty,
            Some(length) => PayloadSize::Length(length),
            None => PayloadSize::Chunked,
        };

        let header = Message::<_, T::Data>::Header((ResponseHead::from_parts(header_parts, ()), payload_size));
        self.framed_write.feed(header).await?;

        loop {
            match body.frame().await {
                Some(Ok(frame)) => {
                    let payload_item = match frame.into_data() {
                        Ok(data) => PayloadItem::Chunk(data),
                        Err(frame) => match frame.into_trailers() {
                            Ok(trailers) => PayloadItem::Trailers(trailers),
                            Err(_) => return Err(SendError::invalid_body("unknown response body frame").into()),
                        },
                    };

                    self.framed_write.send(Message::Payload(payload_item)).await?;
                }
                Some(Err(e)) => return Err(SendError::invalid_body(format!("resolve response body error: {e}")).into()),
                None => {
                    // send flushes the header and payload still buffered
                    self.framed_write.send(Message::Payload(PayloadItem::<T::Data>::Eof)).await?;
                    return Ok(());
                }
            }
        }
    }
}

fn wants_close(values: http::header::GetAll<'_, HeaderValue>) -> bool {
    values.iter().any(|value| {
        value.as_bytes().split(|b| *b == b',').any(|token| token.trim_ascii().eq_ignore_ascii_case(b"close"))
    })
}

/// Puts `identity` into the request extensions. A request already carrying a different
/// identity fails.
fn attach_identity(header: &mut RequestHeader, identity: &ConnectionId) -> Result<(), HttpError> {
    match header.as_mut().extensions_mut().insert(identity.clone()) {
        Some(previous) if !previous.same_as(identity) => {
            Err(HttpError::IdentityMismatch { expected: identity.id(), found: previous.id() })
        }
        _ => Ok(()),
    }
}

fn build_error_response(status_code: StatusCode) -> Response<Empty<Bytes>> {
    let mut response = Response::new(Empty::<Bytes>::new());
    *response.status_mut() = status_code;
    response
}
