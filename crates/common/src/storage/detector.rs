//! Content-type detection for uploaded documents
//!
//! Detection order: magic-byte signatures, then the file-name extension via
//! `mime_guess`, then a plain-text heuristic, else `application/octet-stream`.

use once_cell::sync::Lazy;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Only this many leading bytes are inspected
pub const SNIFF_LEN: usize = 8 * 1024;

const TEXT_PLAIN: &str = "text/plain";

struct Signature {
    offset: usize,
    magic: &'static [u8],
    mime: &'static str,
}

const fn sig(offset: usize, magic: &'static [u8], mime: &'static str) -> Signature {
    Signature { offset, magic, mime }
}

static DETECTOR: Lazy<ContentTypeDetector> = Lazy::new(ContentTypeDetector::new);

/// Process-wide detector, built on first use
pub fn detector() -> &'static ContentTypeDetector {
    &DETECTOR
}

/// Maps leading bytes (and optionally a file name) to a MIME type
pub struct ContentTypeDetector {
    signatures: Vec<Signature>,
}

impl ContentTypeDetector {
    fn new() -> Self {
        let signatures = vec![
            sig(0, b"%PDF-", "application/pdf"),
            sig(0, &[0xFF, 0xD8, 0xFF], "image/jpeg"),
            sig(0, &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A], "image/png"),
            sig(0, b"GIF87a", "image/gif"),
            sig(0, b"GIF89a", "image/gif"),
            sig(0, &[b'I', b'I', 0x2A, 0x00], "image/tiff"),
            sig(0, &[b'M', b'M', 0x00, 0x2A], "image/tiff"),
            sig(0, b"BM", "image/bmp"),
            sig(8, b"WEBP", "image/webp"),
            sig(
                0,
                &[0x00, 0x00, 0x00, 0x0C, b'j', b'P', b' ', b' ', 0x0D, 0x0A, 0x87, 0x0A],
                "image/jp2",
            ),
            sig(0, &[b'P', b'K', 0x03, 0x04], "application/zip"),
        ];
        Self { signatures }
    }

    /// Best-effort MIME type for `bytes`; `file_name` is only a hint
    pub fn detect(&self, bytes: &[u8], file_name: Option<&str>) -> String {
        let head = &bytes[..bytes.len().min(SNIFF_LEN)];

        if let Some(mime) = self.match_signature(head) {
            return mime.to_string();
        }

        if let Some(mime) = file_name.and_then(|name| mime_guess::from_path(name).first()) {
            return mime.essence_str().to_string();
        }

        if looks_like_text(head) {
            return TEXT_PLAIN.to_string();
        }

        OCTET_STREAM.to_string()
    }

    /// Keep the declared type unless it is absent or the generic binary type
    pub fn resolve(&self, declared: Option<&str>, bytes: &[u8], file_name: &str) -> String {
        match declared.map(str::trim) {
            Some(declared) if !declared.is_empty() && !declared.eq_ignore_ascii_case(OCTET_STREAM) => {
                declared.to_string()
            }
            _ => self.detect(bytes, Some(file_name)),
        }
    }

    fn match_signature(&self, head: &[u8]) -> Option<&'static str> {
        self.signatures
            .iter()
            .find(|s| {
                head.get(s.offset..s.offset + s.magic.len())
                    .is_some_and(|window| window == s.magic)
            })
            .map(|s| s.mime)
    }
}

fn looks_like_text(head: &[u8]) -> bool {
    if head.is_empty() {
        return false;
    }
    let valid = match std::str::from_utf8(head) {
        Ok(_) => true,
        // A multi-byte character cut at the sniff boundary is still text
        Err(e) => e.error_len().is_none() && head.len() - e.valid_up_to() < 4,
    };
    valid
        && !head
            .iter()
            .any(|&b| b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0C))
}
