//! Generated request bodies for the decoder benchmarks.

#[derive(Debug, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    payload: TestPayload,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, payload: TestPayload) -> Self {
        Self { name, group, payload }
    }

    pub fn small(name: &'static str, payload: TestPayload) -> Self {
        Self::new(name, TestGroup::Small, payload)
    }

    pub fn normal(name: &'static str, payload: TestPayload) -> Self {
        Self::new(name, TestGroup::Normal, payload)
    }

    pub fn large(name: &'static str, payload: TestPayload) -> Self {
        Self::new(name, TestGroup::Large, payload)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn payload(&self) -> &TestPayload {
        &self.payload
    }
}

/// Body bytes as they appear on the wire, and the size of what they decode to.
#[derive(Debug, Clone)]
pub struct TestPayload {
    wire: Vec<u8>,
    decoded_len: usize,
}

impl TestPayload {
    /// A chunked body with one chunk per entry of `chunk_sizes`, ended by a zero chunk.
    pub fn chunked(chunk_sizes: &[usize]) -> Self {
        let mut wire = Vec::new();
        let mut decoded_len = 0;
        for size in chunk_sizes {
            wire.extend_from_slice(format!("{size:x}\r\n").as_bytes());
            wire.extend(filler(*size));
            wire.extend_from_slice(b"\r\n");
            decoded_len += size;
        }
        wire.extend_from_slice(b"0\r\n\r\n");
        Self { wire, decoded_len }
    }

    /// A multipart body delimited by `boundary`, one form field per entry of `part_sizes`.
    pub fn multipart(boundary: &str, part_sizes: &[usize]) -> Self {
        let mut wire = Vec::new();
        let mut decoded_len = 0;
        for (index, size) in part_sizes.iter().enumerate() {
            wire.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            wire.extend_from_slice(format!("Content-Disposition: form-data; name=\"field{index}\"\r\n").as_bytes());
            wire.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            wire.extend(filler(*size));
            wire.extend_from_slice(b"\r\n");
            decoded_len += size;
        }
        wire.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        Self { wire, decoded_len }
    }

    pub fn wire(&self) -> &[u8] {
        &self.wire
    }

    pub fn decoded_len(&self) -> usize {
        self.decoded_len
    }
}

/// Printable bytes that contain `\r`, `\n` and `-` often enough to exercise the scanners.
fn filler(size: usize) -> impl Iterator<Item = u8> {
    const ALPHABET: &[u8] = b"abcdefghij-klmnopqrst\r\nuvwxyz--0123456789";
    ALPHABET.iter().copied().cycle().take(size)
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Normal,
    Large,
}
