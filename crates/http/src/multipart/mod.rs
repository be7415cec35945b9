//! Incremental decoding of `multipart/*` bodies.
//!
//! [`MultipartDecoder`] is fed the body in whatever slices it arrives and reports parts to a
//! [`PartHandler`]. A delimiter split across two slices is recognized, and bytes that might
//! begin one are held back until the following slice settles it.
//!
//! ```
//! use ferry_http::multipart::{MultipartDecoder, PartCollector};
//!
//! let mut decoder = MultipartDecoder::new("b", PartCollector::new()).unwrap();
//! assert!(!decoder.parse(b"ignored\r\n--b\r\nName: value\r\n\r\nhel").unwrap());
//! assert!(decoder.parse(b"lo\r\n--b--\r\n").unwrap());
//!
//! let parts = decoder.into_handler().into_parts();
//! assert_eq!(parts[0].body(), b"hello");
//! assert_eq!(parts[0].headers().get("name"), Some("value"));
//! ```

mod collector;
mod decoder;
mod error;
mod headers;

pub use collector::{Part, PartCollector, collect_parts};
pub use decoder::{MultipartDecoder, PartHandler};
pub use error::MultipartError;
pub use headers::PartHeaders;

use http::HeaderMap;
use http::header::CONTENT_TYPE;

/// Maximum size of the header section of one part
pub const MAX_PART_HEADER_BYTES: usize = 8 * 1024;

/// Maximum number of headers in one part
pub const MAX_PART_HEADER_NUM: usize = 32;

/// Maximum length of a boundary token, per RFC 2046
pub const MAX_BOUNDARY_LEN: usize = 70;

/// Extracts the boundary token from the `Content-Type` of a multipart request.
pub fn boundary_from_headers(headers: &HeaderMap) -> Result<String, MultipartError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .ok_or(MultipartError::NotMultipart)?;

    let mime: mime::Mime = content_type.parse().map_err(|_| MultipartError::NotMultipart)?;
    if mime.type_() != mime::MULTIPART {
        return Err(MultipartError::NotMultipart);
    }

    let boundary = mime.get_param(mime::BOUNDARY).ok_or(MultipartError::MissingBoundary)?;
    let boundary = boundary.as_str().trim_matches('"');
    if boundary.is_empty() || boundary.len() > MAX_BOUNDARY_LEN {
        return Err(MultipartError::invalid_boundary(format!("boundary length {} is out of range", boundary.len())));
    }

    Ok(boundary.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, content_type.parse().unwrap());
        headers
    }

    #[test]
    fn boundary_from_content_type() {
        assert_eq!(boundary_from_headers(&headers("multipart/form-data; boundary=ABCDEFG")).unwrap(), "ABCDEFG");
        assert_eq!(
            boundary_from_headers(&headers("multipart/mixed; boundary=\"unique-boundary-1\"")).unwrap(),
            "unique-boundary-1"
        );
    }

    #[test]
    fn boundary_errors() {
        assert!(matches!(boundary_from_headers(&HeaderMap::new()), Err(MultipartError::NotMultipart)));
        assert!(matches!(boundary_from_headers(&headers("text/plain")), Err(MultipartError::NotMultipart)));
        assert!(matches!(boundary_from_headers(&headers("multipart/form-data")), Err(MultipartError::MissingBoundary)));
    }
}
