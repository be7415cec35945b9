//! HTTP request decoder module
//!
//! [`RequestDecoder`] alternates between the request head and its payload, so a buffer
//! holding pipelined requests is framed one request at a time.

use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// A decoder for HTTP requests that handles both headers and payload
///
/// The decoder operates in two phases:
/// 1. Header parsing: Decodes the request headers using [`HeaderDecoder`]
/// 2. Payload parsing: Decodes the request body using [`PayloadDecoder`] until its `Eof`
///
/// The next head is only looked at once the payload yielded `Eof`.
pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    payload_decoder: Option<PayloadDecoder>,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Whether the decoder is in the middle of a payload.
    pub fn is_decoding_payload(&self) -> bool {
        self.payload_decoder.is_some()
    }

    fn payload_message(&mut self, item: Option<PayloadItem>) -> Option<Message<(RequestHeader, PayloadSize)>> {
        match item {
            Some(item @ PayloadItem::Eof) => {
                // no need payload decoder in this request now
                self.payload_decoder.take();
                Some(Message::Payload(item))
            }
            Some(item) => Some(Message::Payload(item)),
            None => None,
        }
    }
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self { header_decoder: HeaderDecoder, payload_decoder: None }
    }
}

impl Decoder for RequestDecoder {
    type Item = Message<(RequestHeader, PayloadSize)>;
    type Error = ParseError;

    /// Attempts to decode an HTTP request from the provided buffer
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Message::Header(_)))`: Successfully decoded request headers
    /// - `Ok(Some(Message::Payload(_)))`: Successfully decoded a payload item
    /// - `Ok(None)`: Need more data to proceed
    /// - `Err(_)`: Encountered a parsing error
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // parse payload if have payload_decoder
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let item = payload_decoder.decode(src)?;
            return Ok(self.payload_message(item));
        }

        // parse request
        let message = match self.header_decoder.decode(src)? {
            Some((header, payload_size)) => {
                self.payload_decoder = Some(payload_size.into());
                Some(Message::Header((header, payload_size)))
            }
            None => None,
        };

        Ok(message)
    }

    /// The peer closed its side.
    ///
    /// Between requests that is a clean end. Inside a head or a payload it is an error.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let item = payload_decoder.decode_eof(src)?;
            return Ok(self.payload_message(item));
        }

        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if src.is_empty() => Ok(None),
            None => Err(ParseError::invalid_header("connection closed inside a request head")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use indoc::indoc;

    fn header(message: Message<(RequestHeader, PayloadSize)>) -> (RequestHeader, PayloadSize) {
        match message {
            Message::Header(header) => header,
            Message::Payload(item) => panic!("expected header, got {item:?}"),
        }
    }

    fn payload(message: Message<(RequestHeader, PayloadSize)>) -> PayloadItem {
        message.into_payload_item().unwrap()
    }

    #[test]
    fn pipelined_requests() {
        let str = indoc! {"
            POST /first HTTP/1.1\r
            Transfer-Encoding: chunked\r
            \r
            3\r
            abc\r
            0\r
            \r
            POST /second HTTP/1.1\r
            Content-Length: 2\r
            \r
            de"};

        let mut buf = BytesMut::from(str);
        let mut decoder = RequestDecoder::new();

        let (first, size) = header(decoder.decode(&mut buf).unwrap().unwrap());
        assert_eq!(first.uri().path(), "/first");
        assert!(size.is_chunked());
        assert!(decoder.is_decoding_payload());

        assert_eq!(payload(decoder.decode(&mut buf).unwrap().unwrap()), PayloadItem::Chunk(Bytes::from_static(b"abc")));
        assert!(payload(decoder.decode(&mut buf).unwrap().unwrap()).is_eof());
        assert!(!decoder.is_decoding_payload());

        let (second, size) = header(decoder.decode(&mut buf).unwrap().unwrap());
        assert_eq!(second.uri().path(), "/second");
        assert_eq!(size, PayloadSize::Length(2));

        assert_eq!(payload(decoder.decode(&mut buf).unwrap().unwrap()), PayloadItem::Chunk(Bytes::from_static(b"de")));
        assert!(payload(decoder.decode(&mut buf).unwrap().unwrap()).is_eof());
        assert!(buf.is_empty());
        assert!(decoder.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn empty_body_still_ends_with_eof() {
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\n\r\n"[..]);
        let mut decoder = RequestDecoder::new();

        let (_, size) = header(decoder.decode(&mut buf).unwrap().unwrap());
        assert!(size.is_empty());
        assert!(payload(decoder.decode(&mut buf).unwrap().unwrap()).is_eof());
    }

    #[test]
    fn eof_inside_payload_is_an_error() {
        let mut buf = BytesMut::from(&b"PUT / HTTP/1.1\r\nContent-Length: 10\r\n\r\n12345"[..]);
        let mut decoder = RequestDecoder::new();

        let _ = header(decoder.decode(&mut buf).unwrap().unwrap());
        let _ = payload(decoder.decode(&mut buf).unwrap().unwrap());
        assert!(matches!(decoder.decode_eof(&mut buf), Err(ParseError::IncompleteBody { .. })));
    }

    #[test]
    fn eof_inside_head_is_an_error() {
        let mut buf = BytesMut::from(&b"GET /index.html HTTP/1.1\r\nHost"[..]);
        let mut decoder = RequestDecoder::new();

        assert!(decoder.decode_eof(&mut buf).is_err());
    }
}
