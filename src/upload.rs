//! Streaming `multipart/form-data` body for single-file uploads.
//!
//! The body is the concatenation of three sources:
//!
//! 1. the part header, rendered into memory up front,
//! 2. the caller's payload reader, passed through untouched,
//! 3. a trailer adapter that closes the multipart writer on its first read.
//!
//! The total length is known before any payload byte is read, so the
//! request can carry an exact `Content-Length` while memory use stays
//! independent of the file size.

use std::io::{self, Chain, Cursor, Read};
use std::sync::{Arc, Mutex};

use crate::error::{KuaipanError, Result};
use crate::sign::Signer;

/// Form field the file is sent under.
pub const FILE_FIELD: &str = "file";

/// Closing delimiter bytes beyond the boundary itself: `\r\n--` + `--\r\n`.
const CLOSE_DELIMITER_OVERHEAD: u64 = 8;

const BOUNDARY_RANDOM_BYTES: usize = 30;

/// Generates a 60-character hex boundary from the signer's random source.
pub(crate) fn random_boundary(signer: &Signer) -> String {
    let mut bytes = [0u8; BOUNDARY_RANDOM_BYTES];
    signer.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Returns the last element of a slash-separated path.
pub(crate) fn base_name(path: &str) -> &str {
    if path.is_empty() {
        return ".";
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

fn valid_boundary(boundary: &str) -> bool {
    !boundary.is_empty()
        && boundary.len() <= 70
        && !boundary.ends_with(' ')
        && boundary.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'\'' | b'(' | b')' | b'+' | b'_' | b',' | b'-' | b'.' | b'/' | b':' | b'='
                        | b'?' | b' '
                )
        })
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Minimal multipart writer: one file part, then the closing delimiter.
struct MultipartWriter {
    boundary: String,
    buf: Vec<u8>,
    has_part: bool,
}

impl MultipartWriter {
    fn new(boundary: String) -> Self {
        Self {
            boundary,
            buf: Vec::new(),
            has_part: false,
        }
    }

    fn create_form_file(&mut self, field: &str, filename: &str) {
        let prefix = if self.has_part { "\r\n" } else { "" };
        let header = format!(
            "{prefix}--{boundary}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n",
            boundary = self.boundary,
            field = escape_quotes(field),
            filename = escape_quotes(filename),
        );
        self.buf.extend_from_slice(header.as_bytes());
        self.has_part = true;
    }

    fn close(&mut self) {
        let trailer = format!("\r\n--{}--\r\n", self.boundary);
        self.buf.extend_from_slice(trailer.as_bytes());
    }

    fn take_buffer(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}

/// Shared slot where a payload length mismatch is recorded.
///
/// The HTTP transport only sees an I/O failure; the client reads this slot
/// to report the failure as [`KuaipanError::UploadFraming`].
#[derive(Clone, Default)]
pub(crate) struct FramingCheck(Arc<Mutex<Option<String>>>);

impl FramingCheck {
    fn record(&self, message: String) -> io::Error {
        let mut slot = self.0.lock().unwrap_or_else(|e| e.into_inner());
        slot.get_or_insert_with(|| message.clone());
        io::Error::new(io::ErrorKind::InvalidData, message)
    }

    pub(crate) fn take(&self) -> Option<String> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

/// Passes payload bytes through and fails as soon as the payload is
/// shorter or longer than declared.
struct ExactLength {
    inner: Box<dyn Read + Send>,
    declared: u64,
    remaining: u64,
    check: FramingCheck,
}

impl Read for ExactLength {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        if self.remaining == 0 {
            let mut probe = [0u8; 1];
            return match self.inner.read(&mut probe)? {
                0 => Ok(0),
                _ => Err(self.check.record(format!(
                    "payload is longer than the declared {} bytes",
                    self.declared
                ))),
            };
        }

        let max = out.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut out[..max])?;
        if n == 0 {
            return Err(self.check.record(format!(
                "payload ended {} bytes short of the declared {}",
                self.remaining, self.declared
            )));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}

/// Finalizes the multipart writer on first read and serves the closing
/// delimiter, then reports end of stream.
struct Trailer {
    writer: Option<MultipartWriter>,
    buf: Cursor<Vec<u8>>,
}

impl Read for Trailer {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if let Some(mut writer) = self.writer.take() {
            writer.close();
            self.buf = Cursor::new(writer.take_buffer());
        }
        self.buf.read(out)
    }
}

/// A single-use multipart body carrying one file field.
pub struct UploadBody {
    header: Vec<u8>,
    payload: Box<dyn Read + Send>,
    payload_length: u64,
    writer: MultipartWriter,
    check: FramingCheck,
}

impl std::fmt::Debug for UploadBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadBody")
            .field("boundary", &self.writer.boundary)
            .field("header_length", &self.header.len())
            .field("payload_length", &self.payload_length)
            .finish()
    }
}

impl UploadBody {
    /// Renders the part header for `path` and wraps `payload`.
    ///
    /// The filename attribute is the base name of `path`. No payload bytes
    /// are read here.
    pub fn new(
        path: &str,
        payload: impl Read + Send + 'static,
        payload_length: u64,
        boundary: impl Into<String>,
    ) -> Result<Self> {
        let boundary = boundary.into();
        if !valid_boundary(&boundary) {
            return Err(KuaipanError::UploadFraming(format!(
                "invalid multipart boundary {:?}",
                boundary
            )));
        }

        let mut writer = MultipartWriter::new(boundary);
        writer.create_form_file(FILE_FIELD, base_name(path));
        let header = writer.take_buffer();

        Ok(Self {
            header,
            payload: Box::new(payload),
            payload_length,
            writer,
            check: FramingCheck::default(),
        })
    }

    pub fn boundary(&self) -> &str {
        &self.writer.boundary
    }

    /// Value for the `Content-Type` request header.
    ///
    /// Boundaries containing tspecials are quoted (RFC 2046).
    pub fn content_type(&self) -> String {
        let boundary = &self.writer.boundary;
        if boundary.contains(|c: char| "()<>@,;:\\\"/[]?= ".contains(c)) {
            format!("multipart/form-data; boundary=\"{}\"", boundary)
        } else {
            format!("multipart/form-data; boundary={}", boundary)
        }
    }

    /// Exact number of bytes [`UploadBody::into_reader`] will produce.
    pub fn content_length(&self) -> u64 {
        self.header.len() as u64
            + self.payload_length
            + self.writer.boundary.len() as u64
            + CLOSE_DELIMITER_OVERHEAD
    }

    pub(crate) fn framing_check(&self) -> FramingCheck {
        self.check.clone()
    }

    /// Consumes the body into a forward-only reader.
    pub fn into_reader(self) -> UploadReader {
        let payload = ExactLength {
            inner: self.payload,
            declared: self.payload_length,
            remaining: self.payload_length,
            check: self.check,
        };
        let trailer = Trailer {
            writer: Some(self.writer),
            buf: Cursor::new(Vec::new()),
        };
        UploadReader {
            inner: Cursor::new(self.header).chain(payload).chain(trailer),
        }
    }
}

/// Header, payload and trailer chained into one stream.
pub struct UploadReader {
    inner: Chain<Chain<Cursor<Vec<u8>>, ExactLength>, Trailer>,
}

impl Read for UploadReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        self.inner.read(out)
    }
}
