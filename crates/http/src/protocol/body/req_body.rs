use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;

use futures::channel::{mpsc, oneshot};
use futures::{FutureExt, Stream, StreamExt};

use http_body::{Body, Frame, SizeHint};
use tracing::{error, info};

use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};

type PayloadStreamItem = Result<Message<(RequestHeader, PayloadSize)>, ParseError>;
type PayloadResult = Result<PayloadItem, ParseError>;

/// The decoded request body as seen by a handler.
///
/// Every poll sends a oneshot sender to the [`ReqBodySender`] which answers with the next
/// [`PayloadItem`] read from the connection, or with the framing error that ended the body.
/// Nothing is buffered on this side.
#[derive(Debug)]
pub struct ReqBody {
    signal: mpsc::Sender<oneshot::Sender<PayloadResult>>,
    receiving: Option<oneshot::Receiver<PayloadResult>>,
    payload_size: PayloadSize,
    finished: bool,
}

impl ReqBody {
    fn new(signal: mpsc::Sender<oneshot::Sender<PayloadResult>>, payload_size: PayloadSize) -> Self {
        Self { signal, receiving: None, payload_size, finished: false }
    }

    /// Creates the consumer/producer pair for one request body.
    ///
    /// The sender borrows the connection's payload stream until the body is finished, which
    /// is what keeps the next request's head from being decoded too early.
    pub fn body_channel<S>(payload_stream: &mut S, payload_size: PayloadSize) -> (ReqBody, ReqBodySender<'_, S>)
    where
        S: Stream<Item = PayloadStreamItem> + Unpin,
    {
        let (tx, receiver) = mpsc::channel(16);

        let req_body = ReqBody::new(tx, payload_size);

        let body_sender = ReqBodySender { payload_stream, receiver, eof: false, failed: false };

        (req_body, body_sender)
    }
}

/// Reads payload items off the connection on behalf of a [`ReqBody`].
pub struct ReqBodySender<'conn, S>
where
    S: Stream + Unpin,
{
    payload_stream: &'conn mut S,
    receiver: mpsc::Receiver<oneshot::Sender<PayloadResult>>,
    eof: bool,
    failed: bool,
}

impl<S> ReqBodySender<'_, S>
where
    S: Stream<Item = PayloadStreamItem> + Unpin,
{
    /// Answers pulls from the [`ReqBody`] until the payload ends, the body is dropped, or
    /// the payload turns out to be malformed.
    pub async fn send_body(&mut self) -> Result<(), ParseError> {
        while !self.eof && !self.failed {
            let Some(sender) = self.receiver.next().await else {
                // body dropped by the handler, the rest is drained by skip_body
                return Ok(());
            };

            // the handler may have stopped waiting, the result is simply dropped then
            match self.read_item().await {
                Ok(payload_item) => {
                    if payload_item.is_eof() {
                        self.eof = true;
                    }
                    let _ = sender.send(Ok(payload_item));
                }
                Err(e) => {
                    let _ = sender.send(Err(e.clone()));
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Drains what the handler did not read so the connection is positioned at the next request.
    pub async fn skip_body(&mut self) -> Result<(), ParseError> {
        if self.eof || self.failed {
            return Ok(());
        }

        let mut size: usize = 0;
        loop {
            match self.read_item().await? {
                PayloadItem::Chunk(bytes) => size += bytes.len(),
                PayloadItem::Trailers(_) => {}
                PayloadItem::Eof => {
                    self.eof = true;
                    if size > 0 {
                        info!(size = size, "skip request body");
                    }
                    return Ok(());
                }
            }
        }
    }

    /// Whether the whole payload, up to its end marker, has been read off the connection.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    async fn read_item(&mut self) -> Result<PayloadItem, ParseError> {
        let result = match self.payload_stream.next().await {
            Some(Ok(Message::Payload(payload_item))) => Ok(payload_item),
            Some(Ok(Message::Header(_))) => {
                error!("received header from receive body phase");
                Err(ParseError::invalid_body("received header from receive body phase"))
            }
            Some(Err(e)) => Err(e),
            None => Err(ParseError::incomplete_body("connection closed before the request body finished")),
        };

        if result.is_err() {
            self.failed = true;
        }
        result
    }
}

impl Body for ReqBody {
    type Data = Bytes;
    type Error = ParseError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        loop {
            if let Some(oneshot_receiver) = &mut this.receiving {
                let received = ready!(oneshot_receiver.poll_unpin(cx));
                this.receiving = None;
                return match received {
                    Ok(Ok(PayloadItem::Chunk(bytes))) => Poll::Ready(Some(Ok(Frame::data(bytes)))),
                    Ok(Ok(PayloadItem::Trailers(trailers))) => Poll::Ready(Some(Ok(Frame::trailers(trailers)))),
                    Ok(Ok(PayloadItem::Eof)) => {
                        this.finished = true;
                        Poll::Ready(None)
                    }
                    Ok(Err(e)) => {
                        this.finished = true;
                        Poll::Ready(Some(Err(e)))
                    }
                    Err(_) => {
                        this.finished = true;
                        Poll::Ready(Some(Err(ParseError::invalid_body("request body sender dropped"))))
                    }
                };
            }

            match ready!(this.signal.poll_ready(cx)) {
                Ok(()) => {
                    let (tx, rx) = oneshot::channel();
                    match this.signal.start_send(tx) {
                        Ok(()) => this.receiving = Some(rx),
                        Err(e) => return Poll::Ready(Some(Err(ParseError::invalid_body(e)))),
                    }
                }
                Err(e) => return Poll::Ready(Some(Err(ParseError::invalid_body(e)))),
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.finished
    }

    fn size_hint(&self) -> SizeHint {
        match self.payload_size {
            PayloadSize::Length(length) => SizeHint::with_exact(length),
            PayloadSize::Chunked => SizeHint::new(),
            PayloadSize::Empty => SizeHint::with_exact(0),
        }
    }
}
