use std::fmt::Display;
use std::pin::pin;

use bytes::{Bytes, BytesMut};
use http_body::Body;
use http_body_util::BodyExt;

use crate::multipart::{MultipartDecoder, MultipartError, PartHandler, PartHeaders};

/// A fully received part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    headers: PartHeaders,
    body: BytesMut,
}

impl Part {
    pub fn headers(&self) -> &PartHeaders {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body.freeze()
    }
}

/// A [`PartHandler`] that keeps every part in memory.
#[derive(Debug, Default)]
pub struct PartCollector {
    parts: Vec<Part>,
    current: Option<Part>,
}

impl PartCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parts whose `end_part` has been seen.
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<Part> {
        self.parts
    }
}

impl PartHandler for PartCollector {
    fn begin_part(&mut self, headers: PartHeaders) {
        self.current = Some(Part { headers, body: BytesMut::new() });
    }

    fn data(&mut self, data: Bytes) {
        if let Some(part) = &mut self.current {
            part.body.extend_from_slice(&data);
        }
    }

    fn end_part(&mut self) {
        if let Some(part) = self.current.take() {
            self.parts.push(part);
        }
    }
}

/// Reads `body` to its closing boundary and returns the parts.
///
/// Trailer frames are skipped. The epilogue is not read.
pub async fn collect_parts<B>(body: B, boundary: &str) -> Result<Vec<Part>, MultipartError>
where
    B: Body<Data = Bytes>,
    B::Error: Display,
{
    let mut decoder = MultipartDecoder::new(boundary, PartCollector::new())?;
    let mut body = pin!(body);

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(MultipartError::body)?;
        if let Ok(data) = frame.into_data() {
            if decoder.parse(&data)? {
                break;
            }
        }
    }

    decoder.finish()?;
    Ok(decoder.into_handler().into_parts())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::{Full, StreamBody};
    use http_body::Frame;
    use futures::stream;
    use std::convert::Infallible;

    const BODY: &[u8] = b"--AaB03x\r\n\
        Content-Disposition: form-data; name=\"submit-name\"\r\n\
        \r\n\
        Larry\r\n\
        --AaB03x\r\n\
        Content-Disposition: form-data; name=\"files\"; filename=\"file1.txt\"\r\n\
        Content-Type: text/plain\r\n\
        \r\n\
        ... contents of file1.txt ...\r\n\
        --AaB03x--\r\n";

    #[tokio::test]
    async fn collects_form_data() {
        let parts = collect_parts(Full::new(Bytes::from_static(BODY)), "AaB03x").await.unwrap();

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].headers().field_name(), Some("submit-name"));
        assert_eq!(parts[0].body(), b"Larry");
        assert_eq!(parts[1].headers().file_name(), Some("file1.txt"));
        assert_eq!(parts[1].headers().content_type(), Some(mime::TEXT_PLAIN));
        assert_eq!(parts[1].clone().into_body(), Bytes::from_static(b"... contents of file1.txt ..."));
    }

    #[tokio::test]
    async fn collects_from_fragments() {
        let frames = BODY.chunks(5).map(|chunk| Ok::<_, Infallible>(Frame::data(Bytes::copy_from_slice(chunk))));
        let body = StreamBody::new(stream::iter(frames));

        let parts = collect_parts(body, "AaB03x").await.unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].body(), b"Larry");
    }

    #[tokio::test]
    async fn truncated_body_fails() {
        let truncated = &BODY[..BODY.len() - 12];
        let result = collect_parts(Full::new(Bytes::from_static(truncated)), "AaB03x").await;
        assert!(matches!(result, Err(MultipartError::Incomplete { .. })));
    }
}
