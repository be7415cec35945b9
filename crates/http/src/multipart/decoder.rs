//! Push-style multipart decoder.
//!
//! The decoder is fed successive slices of a `multipart/*` body and reports parts through a
//! [`PartHandler`] as soon as their bytes are known not to belong to a delimiter.

use std::cmp;

use bytes::{Buf, Bytes, BytesMut};
use memchr::memmem::Finder;
use tracing::trace;

use crate::multipart::{MAX_BOUNDARY_LEN, MAX_PART_HEADER_BYTES, MAX_PART_HEADER_NUM, MultipartError, PartHeaders};

/// Receives the parts of a multipart body, in arrival order.
///
/// For every part `begin_part` is called once, then `data` zero or more times with the
/// payload split at arbitrary points, then `end_part` once.
#[cfg_attr(test, mockall::automock)]
pub trait PartHandler {
    fn begin_part(&mut self, headers: PartHeaders);

    fn data(&mut self, data: Bytes);

    fn end_part(&mut self);
}

impl<H: PartHandler + ?Sized> PartHandler for &mut H {
    fn begin_part(&mut self, headers: PartHeaders) {
        (**self).begin_part(headers)
    }

    fn data(&mut self, data: Bytes) {
        (**self).data(data)
    }

    fn end_part(&mut self) {
        (**self).end_part()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Discarding bytes until the first delimiter
    Preamble,
    /// Right after a delimiter: `--` closes the body, CRLF opens a part
    Boundary,
    /// Reading the header section of a part
    Headers,
    /// Reading part payload up to the next delimiter
    Data,
    /// The closing delimiter has been consumed, the epilogue is ignored
    Complete,
}

/// Splits a multipart body into parts.
///
/// Bytes that could be the start of a delimiter are held back until the next slice tells
/// whether they are. Nothing else is buffered.
pub struct MultipartDecoder<H> {
    handler: H,
    delimiter: Finder<'static>,
    state: State,
    buffer: BytesMut,
}

impl<H: PartHandler> MultipartDecoder<H> {
    /// Creates a decoder for the boundary `token`, the value of the `boundary` parameter.
    pub fn new(token: impl AsRef<[u8]>, handler: H) -> Result<Self, MultipartError> {
        let token = token.as_ref();
        if token.is_empty() {
            return Err(MultipartError::invalid_boundary("boundary is empty"));
        }
        if token.len() > MAX_BOUNDARY_LEN {
            return Err(MultipartError::invalid_boundary(format!(
                "boundary has {} bytes, the limit is {MAX_BOUNDARY_LEN}",
                token.len()
            )));
        }

        let mut delimiter = Vec::with_capacity(token.len() + 4);
        delimiter.extend_from_slice(b"\r\n--");
        delimiter.extend_from_slice(token);

        // the first delimiter may open the body without a preceding CRLF
        let mut buffer = BytesMut::with_capacity(1024);
        buffer.extend_from_slice(b"\r\n");

        Ok(Self { handler, delimiter: Finder::new(&delimiter).into_owned(), state: State::Preamble, buffer })
    }

    /// Feeds the next slice of the body.
    ///
    /// Returns `true` once the closing delimiter has been seen. Input after that is ignored.
    pub fn parse(&mut self, input: &[u8]) -> Result<bool, MultipartError> {
        if self.state == State::Complete {
            return Ok(true);
        }

        self.buffer.extend_from_slice(input);

        loop {
            let progressed = match self.state {
                State::Preamble => self.read_preamble(),
                State::Boundary => self.read_boundary()?,
                State::Headers => self.read_headers()?,
                State::Data => self.read_data(),
                State::Complete => {
                    self.buffer.clear();
                    return Ok(true);
                }
            };

            if !progressed {
                return Ok(false);
            }
        }
    }

    /// Signals the end of the body. Fails unless the closing delimiter was seen.
    pub fn finish(&mut self) -> Result<(), MultipartError> {
        match self.state {
            State::Complete => Ok(()),
            State::Preamble => Err(MultipartError::incomplete("an opening boundary")),
            State::Boundary => Err(MultipartError::incomplete("CRLF or -- after a boundary")),
            State::Headers => Err(MultipartError::incomplete("a blank line ending the part headers")),
            State::Data => Err(MultipartError::incomplete("a closing boundary")),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == State::Complete
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    fn delimiter(&self) -> &[u8] {
        self.delimiter.needle()
    }

    fn read_preamble(&mut self) -> bool {
        match self.delimiter.find(&self.buffer) {
            Some(index) => {
                let skip = index + self.delimiter().len();
                trace!(preamble = index, "found opening boundary");
                self.buffer.advance(skip);
                self.state = State::Boundary;
                true
            }
            None => {
                let keep = partial_delimiter_len(&self.buffer, self.delimiter());
                let discard = self.buffer.len() - keep;
                self.buffer.advance(discard);
                false
            }
        }
    }

    fn read_boundary(&mut self) -> Result<bool, MultipartError> {
        let Some(&first) = self.buffer.first() else {
            return Ok(false);
        };

        if first == b'-' {
            return match self.buffer.get(1) {
                None => Ok(false),
                Some(b'-') => {
                    trace!("found closing boundary");
                    self.buffer.clear();
                    self.state = State::Complete;
                    Ok(true)
                }
                Some(_) => Err(MultipartError::invalid_boundary("a single '-' after the boundary")),
            };
        }

        // transport padding before the line break
        let padding = self.buffer.iter().take_while(|b| **b == b' ' || **b == b'\t').count();
        self.buffer.advance(padding);

        match self.buffer.first() {
            None => Ok(false),
            Some(b'\r') => match self.buffer.get(1) {
                None => Ok(false),
                Some(b'\n') => {
                    self.buffer.advance(2);
                    self.state = State::Headers;
                    Ok(true)
                }
                Some(_) => Err(MultipartError::invalid_boundary("CR after the boundary is not followed by LF")),
            },
            Some(b) => Err(MultipartError::invalid_boundary(format!("unexpected byte {b:#04x} after the boundary"))),
        }
    }

    fn read_headers(&mut self) -> Result<bool, MultipartError> {
        // a part without headers
        if self.buffer.starts_with(b"\r\n") {
            self.buffer.advance(2);
            self.handler.begin_part(PartHeaders::new());
            self.state = State::Data;
            return Ok(true);
        }

        if self.buffer.len() < 2 {
            return Ok(false);
        }

        let Some(index) = memchr::memmem::find(&self.buffer, b"\r\n\r\n") else {
            if self.buffer.len() > MAX_PART_HEADER_BYTES {
                return Err(MultipartError::HeaderTooLarge { max_size: MAX_PART_HEADER_BYTES });
            }
            return Ok(false);
        };

        let section = self.buffer.split_to(index + 4);
        if section.len() > MAX_PART_HEADER_BYTES {
            return Err(MultipartError::HeaderTooLarge { max_size: MAX_PART_HEADER_BYTES });
        }

        let headers = parse_part_headers(&section)?;
        trace!(count = headers.len(), "read part headers");
        self.handler.begin_part(headers);
        self.state = State::Data;
        Ok(true)
    }

    fn read_data(&mut self) -> bool {
        match self.delimiter.find(&self.buffer) {
            Some(index) => {
                if index > 0 {
                    let data = self.buffer.split_to(index).freeze();
                    self.handler.data(data);
                }
                let skip = self.delimiter().len();
                self.buffer.advance(skip);
                self.handler.end_part();
                self.state = State::Boundary;
                true
            }
            None => {
                let keep = partial_delimiter_len(&self.buffer, self.delimiter());
                let ready = self.buffer.len() - keep;
                if ready > 0 {
                    let data = self.buffer.split_to(ready).freeze();
                    self.handler.data(data);
                }
                false
            }
        }
    }
}

/// Length of the longest suffix of `buf` that is a proper prefix of `delimiter`.
fn partial_delimiter_len(buf: &[u8], delimiter: &[u8]) -> usize {
    let max = cmp::min(buf.len(), delimiter.len() - 1);
    (1..=max).rev().find(|&len| buf.ends_with(&delimiter[..len])).unwrap_or(0)
}

fn parse_part_headers(section: &[u8]) -> Result<PartHeaders, MultipartError> {
    let mut raw = [httparse::EMPTY_HEADER; MAX_PART_HEADER_NUM];
    let raw = match httparse::parse_headers(section, &mut raw) {
        Ok(httparse::Status::Complete((_, raw))) => raw,
        Ok(httparse::Status::Partial) => return Err(MultipartError::invalid_header("header section is not terminated")),
        Err(e) => return Err(MultipartError::invalid_header(e)),
    };

    let mut headers = PartHeaders::new();
    for header in raw.iter() {
        headers.append(header.name, decode_header_value(header.value));
    }
    Ok(headers)
}

/// UTF-8 when the bytes are valid UTF-8, ISO-8859-1 otherwise. Every byte maps to a char.
fn decode_header_value(value: &[u8]) -> String {
    match std::str::from_utf8(value) {
        Ok(value) => value.to_owned(),
        Err(_) => value.iter().map(|&b| char::from(b)).collect(),
    }
}
