//! Owned, resizable byte container used for request bodies and the
//! incremental response-parsing pipeline.

/// A non-owning borrow of a [`ByteBuffer`]'s logical-length prefix.
pub type BufferView<'a> = &'a [u8];

/// An owned, resizable byte buffer.
///
/// Mirrors the growth and slicing rules of the original `Data` type:
/// `append` grows capacity to ~1.5x the required size on overflow,
/// `copy` clamps to the available content, and `detach` transfers
/// ownership out while leaving the source empty.
#[derive(Debug, Clone, Default)]
pub struct ByteBuffer {
    data: Vec<u8>,
}

impl ByteBuffer {
    /// Construct an empty buffer.
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Construct a zero-filled buffer with the given logical length.
    pub fn with_capacity(size: usize) -> Self {
        Self {
            data: vec![0u8; size],
        }
    }

    /// Construct a buffer by copying the given bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append another buffer's contents, growing capacity to ~1.5x the
    /// required size if the current allocation is insufficient.
    pub fn append(&mut self, other: &ByteBuffer) {
        let required = self.data.len() + other.data.len();
        if self.data.capacity() < required {
            let grown = (required as f64 * 1.5) as usize;
            self.data.reserve(grown.saturating_sub(self.data.len()));
        }
        self.data.extend_from_slice(&other.data);
    }

    /// Return a new buffer holding `data[offset..offset+length]`, clamped
    /// to the available content. Empty if `offset >= len` or `length == 0`.
    pub fn copy(&self, offset: usize, length: usize) -> ByteBuffer {
        if length == 0 || offset >= self.data.len() {
            return ByteBuffer::new();
        }
        let end = (offset + length).min(self.data.len());
        ByteBuffer::from_bytes(&self.data[offset..end])
    }

    /// Return a new buffer holding the subrange from `offset` to the end.
    pub fn copy_from(&self, offset: usize) -> ByteBuffer {
        if offset >= self.data.len() {
            return ByteBuffer::new();
        }
        self.copy(offset, self.data.len() - offset)
    }

    /// Transfer ownership out, leaving this buffer empty.
    pub fn detach(&mut self) -> ByteBuffer {
        ByteBuffer {
            data: std::mem::take(&mut self.data),
        }
    }

    /// Truncate or grow, preserving the existing prefix.
    pub fn resize(&mut self, size: usize) {
        self.data.resize(size, 0);
    }

    /// Zero-fill existing capacity and reset the logical length to zero.
    pub fn reset_data(&mut self) {
        self.data.clear();
    }

    /// Release storage.
    pub fn destroy(&mut self) {
        self.data = Vec::new();
    }

    /// A non-owning borrow of the logical-length prefix.
    pub fn view(&self) -> BufferView<'_> {
        &self.data
    }

    /// Truncate the first `n` bytes off the front, shifting the rest down.
    pub fn drain_front(&mut self, n: usize) {
        let n = n.min(self.data.len());
        self.data.drain(0..n);
    }
}

impl From<Vec<u8>> for ByteBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl From<&str> for ByteBuffer {
    fn from(s: &str) -> Self {
        Self::from_bytes(s.as_bytes())
    }
}

impl From<String> for ByteBuffer {
    fn from(s: String) -> Self {
        Self { data: s.into_bytes() }
    }
}

impl PartialEq for ByteBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.data.len() == other.data.len() && self.data == other.data
    }
}
impl Eq for ByteBuffer {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_concatenates_views() {
        let a = ByteBuffer::from_bytes(b"hello ");
        let b = ByteBuffer::from_bytes(b"world");
        let mut joined = a.clone();
        joined.append(&b);
        assert_eq!(joined.view(), b"hello world");
    }

    #[test]
    fn copy_clamps_to_content() {
        let data = ByteBuffer::from_bytes(b"test data copy.");
        assert_eq!(data.copy(0, 4).view(), b"test");
        assert_eq!(data.copy(10, 4).view(), b"copy");
        assert_eq!(data.copy(0, 20).view(), b"test data copy.");
        assert_eq!(data.copy(0, 0).view(), b"");
        assert_eq!(data.copy(5, 0).view(), b"");
        assert_eq!(data.copy(128, 0).view(), b"");
    }

    #[test]
    fn copy_offset_past_end_is_empty() {
        let data = ByteBuffer::from_bytes(b"abc");
        assert!(data.copy(3, 5).empty());
        assert!(data.copy(10, 5).empty());
    }

    #[test]
    fn detach_empties_source() {
        let mut a = ByteBuffer::from_bytes(b"test");
        let taken = a.detach();
        assert!(a.empty());
        assert_eq!(taken.view(), b"test");
    }

    #[test]
    fn equality_compares_length_then_bytes() {
        let a = ByteBuffer::from_bytes(b"abc");
        let b = ByteBuffer::from_bytes(b"abc");
        let c = ByteBuffer::from_bytes(b"abcd");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
