//! Decoder implementation for HTTP chunked transfer encoding.
//!
//! This module provides functionality to decode HTTP messages that use chunked transfer encoding
//! as specified in [RFC 9112 Section 7.1](https://www.rfc-editor.org/rfc/rfc9112#section-7.1).
//!
//! The decoder is a resumable state machine: every partially read piece of framing (a size
//! line cut in the middle, a chunk tail, a trailer section) is either carried in the state
//! or left in the source buffer, so it can be fed any fragmentation of the input.

use crate::codec::header::{self, MAX_TRAILER_BYTES};
use crate::protocol::{ParseError, PayloadItem};
use bytes::{Buf, BytesMut};
use std::task::Poll;
use tokio_util::codec::Decoder;
use tracing::trace;
use ChunkedState::*;

/// Largest size that can take one more hex digit without overflowing `u64`
const MAX_SIZE_BEFORE_DIGIT: u64 = u64::MAX >> 4;

/// A decoder for handling HTTP chunked transfer encoding.
///
/// The decoder processes incoming bytes according to the chunked format:
/// - Each chunk starts with its size in hexadecimal
/// - Followed by optional extensions and CRLF
/// - Then the chunk data and CRLF
/// - A zero-sized chunk ends the data, optional trailer fields and a CRLF end the message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
}

impl ChunkedDecoder {
    /// Creates a new ChunkedDecoder instance, ready to read the size of the first chunk.
    pub fn new() -> Self {
        Self { state: Size { size: 0, digits: 0 } }
    }

    /// Returns whether the terminating chunk and trailer section have been consumed.
    pub fn is_finished(&self) -> bool {
        self.state == End
    }

    /// Describes what the decoder is still waiting for.
    pub fn expecting(&self) -> &'static str {
        match self.state {
            Size { .. } | SizeLws { .. } | Extension { .. } | SizeLf { .. } => "chunk size line",
            Data { .. } => "chunk data",
            DataCr | DataLf => "CRLF after chunk data",
            Trailers => "trailer section",
            End => "nothing",
        }
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Read the chunk size in hex
    Size { size: u64, digits: u8 },
    /// Whitespace after the size, no more digits allowed
    SizeLws { size: u64 },
    /// Skip chunk extensions
    Extension { size: u64 },
    /// Read LF ending the size line
    SizeLf { size: u64 },
    /// Read chunk data
    Data { remaining: u64 },
    /// Read CR after chunk data
    DataCr,
    /// Read LF after chunk data
    DataLf,
    /// Read the optional trailer fields and the final CRLF
    Trailers,
    /// Final state after the whole message
    End,
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    /// Decodes chunked transfer encoded data from the input buffer.
    ///
    /// # Returns
    /// - `Ok(Some(PayloadItem::Chunk(bytes)))` as soon as chunk data is available
    /// - `Ok(Some(PayloadItem::Trailers(headers)))` when the message carried trailer fields
    /// - `Ok(Some(PayloadItem::Eof))` once the message is complete
    /// - `Ok(None)` when more data is needed
    /// - `Err(ParseError)` if the chunked encoding is invalid
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if self.state == End {
                trace!("finished reading chunked data");
                return Ok(Some(PayloadItem::Eof));
            }

            if src.is_empty() {
                // need more data
                return Ok(None);
            }

            let mut item = None;

            self.state = match self.state.step(src, &mut item) {
                Poll::Pending => return Ok(None),
                Poll::Ready(Ok(new_state)) => new_state,
                Poll::Ready(Err(e)) => return Err(e),
            };

            if let Some(item) = item {
                if let PayloadItem::Chunk(bytes) = &item {
                    trace!(len = bytes.len(), "read chunked bytes");
                }
                return Ok(Some(item));
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None => Err(ParseError::incomplete_body(format!("stream ended while reading {}", self.expecting()))),
        }
    }
}

macro_rules! try_next_byte {
    ($src:ident) => {{
        if $src.len() > 0 {
            $src.get_u8()
        } else {
            return Poll::Pending;
        }
    }};
}

impl ChunkedState {
    /// Processes the next step of the chunked decoding state machine.
    ///
    /// `item` is filled when the step produced chunk data or trailers.
    fn step(&self, src: &mut BytesMut, item: &mut Option<PayloadItem>) -> Poll<Result<ChunkedState, ParseError>> {
        match *self {
            Size { size, digits } => ChunkedState::read_size(src, size, digits),
            SizeLws { size } => ChunkedState::read_size_lws(src, size),
            Extension { size } => ChunkedState::read_extension(src, size),
            SizeLf { size } => ChunkedState::read_size_lf(src, size),
            Data { remaining } => ChunkedState::read_data(src, remaining, item),
            DataCr => ChunkedState::read_data_cr(src),
            DataLf => ChunkedState::read_data_lf(src),
            Trailers => ChunkedState::read_trailers(src, item),
            End => Poll::Ready(Ok(End)),
        }
    }

    /// Reads one hex digit of the chunk size, or the delimiter ending it.
    ///
    /// A size line must carry at least one digit.
    fn read_size(src: &mut BytesMut, size: u64, digits: u8) -> Poll<Result<ChunkedState, ParseError>> {
        let b = try_next_byte!(src);
        let value = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b + 10 - b'a',
            b'A'..=b'F' => b + 10 - b'A',
            b'\t' | b' ' | b';' | b'\r' if digits == 0 => {
                return Poll::Ready(Err(ParseError::invalid_chunk("chunk size line has no digits")));
            }
            b'\t' | b' ' => return Poll::Ready(Ok(SizeLws { size })),
            b';' => return Poll::Ready(Ok(Extension { size })),
            b'\r' => return Poll::Ready(Ok(SizeLf { size })),
            _ => return Poll::Ready(Err(ParseError::invalid_chunk(format!("invalid byte {b:#04x} in chunk size")))),
        };

        // leading zeros don't count against the limit, only the value does
        if size > MAX_SIZE_BEFORE_DIGIT {
            return Poll::Ready(Err(ParseError::invalid_chunk("chunk size overflow")));
        }

        Poll::Ready(Ok(Size { size: (size << 4) | u64::from(value), digits: digits.saturating_add(1) }))
    }

    /// Linear whitespace after the size: more whitespace, extensions or the line end.
    fn read_size_lws(src: &mut BytesMut, size: u64) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\t' | b' ' => Poll::Ready(Ok(SizeLws { size })),
            b';' => Poll::Ready(Ok(Extension { size })),
            b'\r' => Poll::Ready(Ok(SizeLf { size })),
            _ => Poll::Ready(Err(ParseError::invalid_chunk("invalid chunk size linear white space"))),
        }
    }

    /// Chunk extensions are skipped up to the CR of the size line.
    ///
    /// A bare LF inside an extension is rejected, some peers would treat it as the line end.
    fn read_extension(src: &mut BytesMut, size: u64) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(SizeLf { size })),
            b'\n' => Poll::Ready(Err(ParseError::invalid_chunk("invalid chunk extension contains newline"))),
            _ => Poll::Ready(Ok(Extension { size })),
        }
    }

    /// LF ending the size line. A zero size moves on to the trailer section.
    fn read_size_lf(src: &mut BytesMut, size: u64) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\n' if size == 0 => Poll::Ready(Ok(Trailers)),
            b'\n' => Poll::Ready(Ok(Data { remaining: size })),
            _ => Poll::Ready(Err(ParseError::invalid_chunk("invalid chunk size LF"))),
        }
    }

    /// Hands out as much of the current chunk as the buffer holds.
    fn read_data(src: &mut BytesMut, remaining: u64, item: &mut Option<PayloadItem>) -> Poll<Result<ChunkedState, ParseError>> {
        if src.is_empty() {
            return Poll::Pending;
        }

        // cap remaining bytes at the max capacity of usize
        let remaining_usize = usize::try_from(remaining).unwrap_or(usize::MAX);
        let read_size = std::cmp::min(remaining_usize, src.len());

        let bytes = src.split_to(read_size).freeze();
        *item = Some(PayloadItem::Chunk(bytes));

        let remaining = remaining - read_size as u64;
        if remaining > 0 { Poll::Ready(Ok(Data { remaining })) } else { Poll::Ready(Ok(DataCr)) }
    }

    fn read_data_cr(src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(DataLf)),
            _ => Poll::Ready(Err(ParseError::invalid_chunk("chunk data longer than its declared size"))),
        }
    }

    fn read_data_lf(src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(Size { size: 0, digits: 0 })),
            _ => Poll::Ready(Err(ParseError::invalid_chunk("invalid chunk data LF"))),
        }
    }

    /// Reads the trailer section after the last chunk.
    ///
    /// An immediate CRLF ends the message. Otherwise the section stays in `src` until the
    /// blank line ending it has arrived, then it is parsed as a whole.
    fn read_trailers(src: &mut BytesMut, item: &mut Option<PayloadItem>) -> Poll<Result<ChunkedState, ParseError>> {
        if src.starts_with(b"\r\n") {
            src.advance(2);
            return Poll::Ready(Ok(End));
        }

        if src.len() < 2 && src.first() == Some(&b'\r') {
            return Poll::Pending;
        }

        match memchr::memmem::find(src, b"\r\n\r\n") {
            Some(index) => {
                let section = src.split_to(index + 4);
                match header::parse_trailers(&section) {
                    Ok(trailers) => {
                        trace!(count = trailers.len(), "read chunked trailers");
                        *item = Some(PayloadItem::Trailers(trailers));
                        Poll::Ready(Ok(End))
                    }
                    Err(e) => Poll::Ready(Err(e)),
                }
            }
            None if src.len() > MAX_TRAILER_BYTES => {
                Poll::Ready(Err(ParseError::too_large_header(src.len(), MAX_TRAILER_BYTES)))
            }
            None => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn decode_all(decoder: &mut ChunkedDecoder, buffer: &mut BytesMut) -> Vec<PayloadItem> {
        let mut items = vec![];
        while let Some(item) = decoder.decode(buffer).unwrap() {
            let eof = item.is_eof();
            items.push(item);
            if eof {
                break;
            }
        }
        items
    }

    #[test]
    fn test_basic() {
        let mut buffer: BytesMut = BytesMut::from(&b"10\r\n1234567890abcdef\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let item = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(item.is_chunk());
        assert_eq!(item.as_bytes().unwrap(), &Bytes::from_static(b"1234567890abcdef"));

        let item = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(item.is_eof());
        assert!(decoder.is_finished());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_chunks() {
        let mut buffer: BytesMut = BytesMut::from(&b"5\r\nhello\r\n7\r\n, world\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let items = decode_all(&mut decoder, &mut buffer);
        assert_eq!(
            items,
            vec![
                PayloadItem::Chunk(Bytes::from_static(b"hello")),
                PayloadItem::Chunk(Bytes::from_static(b", world")),
                PayloadItem::Eof
            ]
        );
    }

    #[test]
    fn test_chunks_with_extensions() {
        let mut buffer: BytesMut = BytesMut::from(&b"5;chunk-ext=value\r\nhello\r\n0 ;last\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::from_static(b"hello"));

        let eof = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(eof.is_eof());
    }

    #[test]
    fn test_chunks_with_trailers() {
        let mut buffer: BytesMut =
            BytesMut::from(&b"5\r\nhello\r\n0\r\nExpires: never\r\nX-Checksum: 42\r\n\r\nGET / HTTP/1.1\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::from_static(b"hello"));

        match decoder.decode(&mut buffer).unwrap().unwrap() {
            PayloadItem::Trailers(trailers) => {
                assert_eq!(trailers.len(), 2);
                assert_eq!(trailers.get("expires").unwrap(), "never");
                assert_eq!(trailers.get("x-checksum").unwrap(), "42");
            }
            other => panic!("expected trailers, got {other:?}"),
        }

        let eof = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(eof.is_eof());

        // the next request on the connection is left alone
        assert_eq!(&buffer[..], b"GET / HTTP/1.1\r\n");
    }

    #[test]
    fn test_trailers_split_across_buffers() {
        let mut decoder = ChunkedDecoder::new();
        let mut buffer = BytesMut::from(&b"0\r\nX-Trace: a"[..]);

        assert!(decoder.decode(&mut buffer).unwrap().is_none());
        assert_eq!(&buffer[..], b"X-Trace: a");

        buffer.extend_from_slice(b"bc\r\n\r");
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"\n");
        let trailers = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(trailers.is_trailers());
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn test_incomplete_chunk() {
        let mut buffer: BytesMut = BytesMut::from(&b"5\r\nhel"[..]);
        let mut decoder = ChunkedDecoder::new();

        // partial data is handed out right away
        let chunk = decoder.decode(&mut buffer).unwrap();
        assert_eq!(chunk.unwrap().as_bytes().unwrap(), &Bytes::from_static(b"hel"));
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"lo\r\n0\r\n\r\n");

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::from_static(b"lo"));

        let eof = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(eof.is_eof());
    }

    #[test]
    fn test_size_line_split_across_buffers() {
        let mut decoder = ChunkedDecoder::new();
        let mut buffer = BytesMut::from(&b"1"[..]);
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"a\r");
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"\n");
        buffer.extend_from_slice(&[b'x'; 26]);
        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap().len(), 26);
    }

    #[test]
    fn test_invalid_chunk_size() {
        let mut buffer: BytesMut = BytesMut::from(&b"xyz\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let result = decoder.decode(&mut buffer);
        assert!(matches!(result, Err(ParseError::InvalidChunk { .. })));
    }

    #[test]
    fn test_empty_chunk_size() {
        let mut buffer: BytesMut = BytesMut::from(&b"\r\nhello\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        assert!(decoder.decode(&mut buffer).is_err());
    }

    #[test]
    fn test_chunk_size_overflow() {
        let mut buffer: BytesMut = BytesMut::from(&b"10000000000000000\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        assert!(decoder.decode(&mut buffer).is_err());
    }

    #[test]
    fn test_chunk_size_max_value() {
        let mut buffer: BytesMut = BytesMut::from(&b"ffffffffffffffff\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        assert!(decoder.decode(&mut buffer).unwrap().is_none());
        assert!(matches!(decoder.state, ChunkedState::Data { remaining: u64::MAX }));
    }

    #[test]
    fn test_chunk_size_leading_zeros() {
        let mut buffer: BytesMut = BytesMut::from(&b"00000000000000005\r\nhello\r\n0000000000000000000000000000000000\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::from_static(b"hello"));
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_missing_crlf() {
        let mut buffer: BytesMut = BytesMut::from(&b"5\r\nhelloBad"[..]);
        let mut decoder = ChunkedDecoder::new();

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::from_static(b"hello"));

        let result = decoder.decode(&mut buffer);
        assert!(result.is_err());
    }

    #[test]
    fn test_eof_before_end() {
        let mut buffer: BytesMut = BytesMut::from(&b"5\r\nhel"[..]);
        let mut decoder = ChunkedDecoder::new();

        let _ = decoder.decode(&mut buffer).unwrap().unwrap();
        let result = decoder.decode_eof(&mut buffer);
        assert!(matches!(result, Err(ParseError::IncompleteBody { .. })));
    }

    #[test]
    fn test_large_chunk() {
        let size = 1024 * 1024;
        let mut data = Vec::with_capacity(size + 16);
        data.extend(format!("{size:x}\r\n").into_bytes());
        data.extend(vec![b'A'; size]);
        data.extend(b"\r\n0\r\n\r\n");

        let mut buffer = BytesMut::from(&data[..]);
        let mut decoder = ChunkedDecoder::new();

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap().len(), size);
        assert!(chunk.as_bytes().unwrap().iter().all(|&b| b == b'A'));

        let eof = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(eof.is_eof());
    }

    #[test]
    fn test_zero_size_chunk() {
        let mut buffer: BytesMut = BytesMut::from(&b"0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let eof = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(eof.is_eof());
    }
}
