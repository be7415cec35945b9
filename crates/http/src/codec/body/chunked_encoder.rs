use crate::protocol::{PayloadItem, SendError};
use bytes::{Buf, BufMut, BytesMut};
use http::HeaderMap;
use std::io::Write;

use tokio_util::codec::Encoder;

/// Writes a payload with chunked transfer encoding.
///
/// Trailers end the payload: the last chunk and the trailer section are written together and
/// anything encoded after them is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedEncoder {
    eof: bool,
    send_size: usize,
}

impl ChunkedEncoder {
    pub fn new() -> Self {
        Self { eof: false, send_size: 0 }
    }

    pub fn is_finish(&self) -> bool {
        self.eof
    }

    /// Payload bytes written so far, framing excluded.
    pub fn send_size(&self) -> usize {
        self.send_size
    }

    fn write_last_chunk(&mut self, trailers: Option<&HeaderMap>, dst: &mut BytesMut) {
        self.eof = true;
        dst.extend_from_slice(b"0\r\n");
        if let Some(trailers) = trailers {
            for (name, value) in trailers {
                dst.put_slice(name.as_str().as_bytes());
                dst.put_slice(b": ");
                dst.put_slice(value.as_bytes());
                dst.put_slice(b"\r\n");
            }
        }
        dst.extend_from_slice(b"\r\n");
    }
}

impl Default for ChunkedEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for ChunkedEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if self.eof {
            return Ok(());
        }

        match item {
            PayloadItem::Chunk(bytes) => {
                // an empty chunk would read as the last one
                if !bytes.has_remaining() {
                    return Ok(());
                }
                let size = bytes.remaining();
                write!(helper::Writer(dst), "{size:X}\r\n")?;
                dst.reserve(size + 2);
                dst.put(bytes);
                dst.extend_from_slice(b"\r\n");
                self.send_size += size;
                Ok(())
            }
            PayloadItem::Trailers(trailers) => {
                self.write_last_chunk(Some(&trailers), dst);
                Ok(())
            }
            PayloadItem::Eof => {
                self.write_last_chunk(None, dst);
                Ok(())
            }
        }
    }
}

mod helper {
    use bytes::{BufMut, BytesMut};
    use std::io;

    pub struct Writer<'a>(pub &'a mut BytesMut);

    impl io::Write for Writer<'_> {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.put_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn writes_chunks_and_last_chunk() {
        let mut encoder = ChunkedEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"hello world!")), &mut dst).unwrap();
        encoder.encode(PayloadItem::Chunk(Bytes::new()), &mut dst).unwrap();
        encoder.encode(PayloadItem::<Bytes>::Eof, &mut dst).unwrap();

        assert_eq!(&dst[..], b"C\r\nhello world!\r\n0\r\n\r\n");
        assert!(encoder.is_finish());
        assert_eq!(encoder.send_size(), 12);
    }

    #[test]
    fn writes_trailer_section() {
        let mut encoder = ChunkedEncoder::new();
        let mut dst = BytesMut::new();
        let mut trailers = HeaderMap::new();
        trailers.insert("x-checksum", "42".parse().unwrap());

        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"abc")), &mut dst).unwrap();
        encoder.encode(PayloadItem::<Bytes>::Trailers(trailers), &mut dst).unwrap();
        encoder.encode(PayloadItem::<Bytes>::Eof, &mut dst).unwrap();

        assert_eq!(&dst[..], b"3\r\nabc\r\n0\r\nx-checksum: 42\r\n\r\n");
    }
}
