//! Response status line, header map, and chunked-transfer decoding.

use std::collections::HashMap;

use crate::buffer::ByteBuffer;
use crate::error::{Error, ResultCode};

/// Parsed status line plus the header map, returned once the header
/// block has been fully received.
#[derive(Debug, Clone, Default)]
pub struct ResponseHeader {
    pub version: String,
    pub status_code: u16,
    pub reason_phrase: String,
    pub headers: HashMap<String, String>,
}

impl ResponseHeader {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    pub fn is_need_redirect(&self) -> bool {
        self.status_code == 301 || self.status_code == 302
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn split_on<'a>(data: &'a [u8], delimiter: &[u8]) -> Vec<&'a [u8]> {
    let mut tokens = Vec::new();
    let mut start = 0;
    while let Some(rel) = find_subslice(&data[start..], delimiter) {
        let end = start + rel;
        if end > start {
            tokens.push(&data[start..end]);
        }
        start = end + delimiter.len();
    }
    if start < data.len() {
        tokens.push(&data[start..]);
    }
    tokens
}

/// Parse the status line and header map out of `data`, if a complete
/// `\r\n\r\n`-terminated header block is present. Returns the parsed
/// header plus the byte offset of the first body byte.
pub fn parse_response_header(data: &[u8]) -> Option<(ResponseHeader, usize)> {
    const HEADER_END: &[u8] = b"\r\n\r\n";
    let header_end_pos = find_subslice(data, HEADER_END)?;
    let header_block = &data[..header_end_pos];
    let lines = split_on(header_block, b"\r\n");
    if lines.is_empty() {
        return None;
    }

    let status_line = std::str::from_utf8(lines[0]).ok()?;
    const HTTP_FLAG: &str = "HTTP/";
    let version_pos = status_line.find(HTTP_FLAG)?;
    let version_end = version_pos + HTTP_FLAG.len() + 3;
    if status_line.len() < version_end + 1 + 3 {
        return None;
    }
    let version = status_line[version_pos..version_end].to_string();
    let status_code: u16 = status_line[version_end + 1..version_end + 4].parse().ok()?;
    let reason_phrase = status_line
        .get(version_end + 1 + 3 + 1..)
        .unwrap_or("")
        .to_string();

    let mut headers = HashMap::new();
    for line in &lines {
        if line.is_empty() || find_subslice(line, b":").is_none() {
            continue;
        }
        let fields = split_on(line, b": ");
        if fields.len() == 2 {
            let name = String::from_utf8_lossy(fields[0]).trim_start().to_string();
            let value = String::from_utf8_lossy(fields[1]).trim_start().to_string();
            headers.insert(name, value);
        }
    }

    Some((
        ResponseHeader {
            version,
            status_code,
            reason_phrase,
            headers,
        },
        header_end_pos + HEADER_END.len(),
    ))
}

/// Incremental `Transfer-Encoding: chunked` decoder.
///
/// Holds just enough state (the size remaining in the chunk currently
/// being consumed) to resume across successive reads.
pub struct ChunkDecoder {
    chunk_size: i64,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self { chunk_size: -1 }
    }

    /// Feed newly received bytes. Invokes `emit` once per decoded
    /// chunk-body slice. Returns whether the terminating zero-size
    /// chunk was reached, plus any bytes left over for the next call.
    pub fn decode(
        &mut self,
        data: &[u8],
        mut emit: impl FnMut(ByteBuffer),
    ) -> Result<(bool, ByteBuffer), Error> {
        let mut view = data;
        let mut completed = false;
        while !view.is_empty() {
            if self.chunk_size <= 0 {
                let Some(pos) = find_subslice(view, b"\r\n") else {
                    return Err(Error::new(ResultCode::ChunkSizeError));
                };
                let size_str = std::str::from_utf8(&view[..pos])
                    .map_err(|_| Error::new(ResultCode::ChunkSizeError))?;
                let size = i64::from_str_radix(size_str.trim(), 16)
                    .map_err(|_| Error::new(ResultCode::ChunkSizeError))?;
                self.chunk_size = size;
                if size == 0 {
                    completed = true;
                    break;
                }
                view = &view[pos + 2..];
            } else {
                let take = (self.chunk_size as usize).min(view.len());
                emit(ByteBuffer::from_bytes(&view[..take]));
                view = &view[take..];
                self.chunk_size -= take as i64;
            }

            if view.starts_with(b"\r\n") {
                view = &view[2..];
            }
        }

        Ok((completed, ByteBuffer::from_bytes(view)))
    }
}

impl Default for ChunkDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_line_and_headers() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nServer: test\r\n\r\nhello";
        let (header, offset) = parse_response_header(raw).expect("should parse");
        assert_eq!(header.version, "HTTP/1.1");
        assert_eq!(header.status_code, 200);
        assert_eq!(header.reason_phrase, "OK");
        assert_eq!(header.header("Content-Length"), Some("5"));
        assert_eq!(header.header("Server"), Some("test"));
        assert_eq!(&raw[offset..], b"hello");
    }

    #[test]
    fn incomplete_header_block_returns_none() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n";
        assert!(parse_response_header(raw).is_none());
    }

    #[test]
    fn redirect_status_codes_are_detected() {
        let raw = b"HTTP/1.1 302 Found\r\nLocation: http://example.com\r\n\r\n";
        let (header, _) = parse_response_header(raw).unwrap();
        assert!(header.is_need_redirect());
        assert!(!header.is_success());
    }

    #[test]
    fn chunked_body_decodes_wikipedia_example() {
        let mut decoder = ChunkDecoder::new();
        let raw = b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n";
        let mut collected = Vec::new();
        let (completed, leftover) = decoder
            .decode(raw, |chunk| collected.push(chunk))
            .expect("valid chunk stream");
        assert!(completed);
        assert!(leftover.empty());
        let joined: Vec<u8> = collected.iter().flat_map(|c| c.view().to_vec()).collect();
        assert_eq!(joined, b"Wikipedia");
    }

    #[test]
    fn chunked_body_resumes_across_partial_reads() {
        let mut decoder = ChunkDecoder::new();
        let mut collected = Vec::new();
        let (completed, leftover) = decoder.decode(b"4\r\nWi", |c| collected.push(c)).unwrap();
        assert!(!completed);
        let rest = [leftover.view(), b"ki\r\n0\r\n\r\n"].concat();
        let (completed, _) = decoder.decode(&rest, |c| collected.push(c)).unwrap();
        assert!(completed);
        let joined: Vec<u8> = collected.iter().flat_map(|c| c.view().to_vec()).collect();
        assert_eq!(joined, b"Wiki");
    }

    #[test]
    fn malformed_chunk_size_is_an_error() {
        let mut decoder = ChunkDecoder::new();
        let err = decoder.decode(b"zz\r\n", |_| {}).unwrap_err();
        assert_eq!(err.code, ResultCode::ChunkSizeError);
    }
}
