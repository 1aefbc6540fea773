//! Multipart upload decoding
//!
//! Extracts the single `audio-file` part from a raw `multipart/form-data`
//! request body and writes its payload to the upload store.
//!
//! Part headers are scanned line by line with a small state machine:
//!
//! ```text
//! ExpectDisposition --Content-Disposition--> ExpectTypeOrContent
//! ExpectTypeOrContent --Content-Type--> ExpectTypeOrContent (once)
//! ExpectTypeOrContent --blank line / any other line--> InContent
//! ```
//!
//! Once in content, every remaining byte up to the closing delimiter is
//! payload, including lines that look like headers.

use dechorder_common::FileStore;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::UploadedFile;

/// Form field that must carry the audio file
pub const AUDIO_FIELD_NAME: &str = "audio-file";

/// Accepted upload extensions (lower case, with dot)
pub const ALLOWED_EXTENSIONS: [&str; 3] = [".wav", ".mp3", ".m4a"];

/// MIME type assumed when the part has no Content-Type header
pub const DEFAULT_MIME_TYPE: &str = "text/plain";

const NEWLINE: &[u8] = b"\r\n";
const DISPOSITION_PREFIX: &[u8] = b"Content-Disposition";
const CONTENT_TYPE_PREFIX: &[u8] = b"Content-Type";

/// Requests that do not match the upload interface
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestFormatError {
    #[error("Expected a multipart/form-data request with content type defined")]
    MissingBoundary,

    #[error("Expected a non-empty multipart/form-data body")]
    EmptyBody,

    #[error("Malformed request body")]
    MalformedBody,

    #[error("Expected a file with key \"audio-file\" in the request")]
    UnexpectedFieldName(String),

    #[error("Only the following file extensions are supported: .wav, .mp3, .m4a")]
    UnsupportedExtension(String),

    #[error("Audio data missing")]
    MissingFileContent,
}

/// Upload decoding errors
#[derive(Debug, Error)]
pub enum UploadError {
    /// Client sent a request that does not match the interface
    #[error(transparent)]
    Format(#[from] RequestFormatError),

    /// Upload store failed to persist the payload
    #[error("Failed to store uploaded file: {0}")]
    Storage(#[from] dechorder_common::Error),
}

/// Scanner state while walking the part's lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    ExpectDisposition,
    ExpectTypeOrContent,
    InContent { start: usize },
}

/// Headers and payload of the single file part
#[derive(Debug)]
struct FilePart<'a> {
    disposition: &'a [u8],
    content_type: Option<&'a [u8]>,
    content: &'a [u8],
}

/// Decodes multipart uploads into stored files
#[derive(Clone)]
pub struct MultipartDecoder {
    store: Arc<dyn FileStore>,
}

impl MultipartDecoder {
    pub fn new(store: Arc<dyn FileStore>) -> Self {
        Self { store }
    }

    /// Parse the raw HTTP request and store the `audio-file` payload
    ///
    /// The payload is stored under `{upload_id}{extension}`, so `upload_id`
    /// must be unique per request.
    pub fn decode(
        &self,
        headers: &HashMap<String, String>,
        body: &[u8],
        upload_id: &str,
    ) -> Result<UploadedFile, UploadError> {
        let boundary = boundary_from_headers(headers)?;
        let part_bytes = extract_first_part(body, boundary.as_bytes())?;
        let part = scan_part(part_bytes)?;

        let disposition = std::str::from_utf8(part.disposition).map_err(|_| {
            warn!("Content-Disposition line is not valid UTF-8");
            RequestFormatError::MalformedBody
        })?;
        let (field_name, original_filename) = parse_content_disposition(disposition)
            .ok_or_else(|| {
                warn!("Failed to parse Content-Disposition line: {}", disposition);
                RequestFormatError::MalformedBody
            })?;

        if field_name != AUDIO_FIELD_NAME {
            return Err(RequestFormatError::UnexpectedFieldName(field_name).into());
        }

        let extension = file_extension(&original_filename);
        let mime_type = match part.content_type {
            Some(line) => parse_content_type(line)?,
            None => DEFAULT_MIME_TYPE.to_string(),
        };
        info!(
            "Original filename: \"{}\". Inferred MIME type: {}",
            original_filename, mime_type
        );

        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(RequestFormatError::UnsupportedExtension(extension).into());
        }

        let key = format!("{}{}", upload_id, extension);
        info!(
            "Saving uploaded file ({} bytes) under key \"{}\"",
            part.content.len(),
            key
        );
        let stored_path = self.store.write(&key, part.content)?;

        Ok(UploadedFile {
            original_filename,
            stored_path,
            mime_type,
            extension,
        })
    }
}

/// Boundary token from a case-insensitive `content-type` header
fn boundary_from_headers(headers: &HashMap<String, String>) -> Result<String, RequestFormatError> {
    let content_type = headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("content-type"))
        .map(|(_, value)| value.as_str())
        .ok_or(RequestFormatError::MissingBoundary)?;

    let (_, token) = content_type
        .rsplit_once("boundary=")
        .ok_or(RequestFormatError::MissingBoundary)?;
    let boundary = token.replace('"', "");
    let boundary = boundary.trim();
    if boundary.is_empty() {
        return Err(RequestFormatError::MissingBoundary);
    }
    Ok(boundary.to_string())
}

/// Bytes of the first part, between its opening delimiter and the next
/// delimiter (either another part or the closing `--boundary--`)
fn extract_first_part<'a>(body: &'a [u8], boundary: &[u8]) -> Result<&'a [u8], RequestFormatError> {
    let initial_delimiter = [b"--", boundary, NEWLINE].concat();
    let next_delimiter = [NEWLINE, b"--", boundary].concat();

    let start = find(body, &initial_delimiter).ok_or_else(|| {
        warn!("Failed to parse the raw multipart body: opening delimiter not found");
        RequestFormatError::EmptyBody
    })? + initial_delimiter.len();
    let rest = &body[start..];

    let end = find(rest, &next_delimiter).ok_or_else(|| {
        warn!("Failed to parse the raw multipart body: closing delimiter not found");
        RequestFormatError::EmptyBody
    })?;
    Ok(&rest[..end])
}

/// Walk the part line by line, separating headers from content
fn scan_part(part: &[u8]) -> Result<FilePart<'_>, RequestFormatError> {
    let mut state = ScanState::ExpectDisposition;
    let mut disposition = None;
    let mut content_type = None;
    let mut offset = 0;

    while offset < part.len() {
        let line_end = find(&part[offset..], NEWLINE)
            .map(|i| offset + i)
            .unwrap_or(part.len());
        let line = &part[offset..line_end];
        let next = (line_end + NEWLINE.len()).min(part.len());

        state = match state {
            ScanState::ExpectDisposition if line.is_empty() => ScanState::ExpectDisposition,
            ScanState::ExpectDisposition if line.starts_with(DISPOSITION_PREFIX) => {
                disposition = Some(line);
                ScanState::ExpectTypeOrContent
            }
            ScanState::ExpectDisposition => return Err(RequestFormatError::MalformedBody),
            // A blank line terminates the part headers.
            ScanState::ExpectTypeOrContent if line.is_empty() => ScanState::InContent { start: next },
            ScanState::ExpectTypeOrContent
                if content_type.is_none() && line.starts_with(CONTENT_TYPE_PREFIX) =>
            {
                content_type = Some(line);
                ScanState::ExpectTypeOrContent
            }
            ScanState::ExpectTypeOrContent => ScanState::InContent { start: offset },
            ScanState::InContent { start } => ScanState::InContent { start },
        };

        if let ScanState::InContent { .. } = state {
            break;
        }
        offset = next;
    }

    let disposition = disposition.ok_or(RequestFormatError::MalformedBody)?;
    let content = match state {
        ScanState::InContent { start } => &part[start..],
        _ => &[][..],
    };
    if content.is_empty() {
        return Err(RequestFormatError::MissingFileContent);
    }

    Ok(FilePart {
        disposition,
        content_type,
        content,
    })
}

/// Parse `Content-Disposition: form-data; name="..."; filename="..."`
///
/// Returns `(name, filename)`; both parameters must be present and quoted.
fn parse_content_disposition(line: &str) -> Option<(String, String)> {
    let value = line.strip_prefix("Content-Disposition:")?.trim_start();
    let params = value.strip_prefix("form-data")?;

    let mut name = None;
    let mut filename = None;
    let mut rest = params.trim_start();

    while !rest.is_empty() {
        rest = rest.strip_prefix(';')?.trim_start();
        let (key, after_key) = rest.split_once('=')?;
        let after_quote = after_key.strip_prefix('"')?;
        let close = after_quote.find('"')?;
        let param_value = after_quote[..close].to_string();

        match key.trim() {
            "name" => name = Some(param_value),
            "filename" => filename = Some(param_value),
            _ => {}
        }
        rest = after_quote[close + 1..].trim_start();
    }

    Some((name?, filename?))
}

fn parse_content_type(line: &[u8]) -> Result<String, RequestFormatError> {
    let line = std::str::from_utf8(line).map_err(|_| RequestFormatError::MalformedBody)?;
    let value = line
        .strip_prefix("Content-Type:")
        .map(str::trim)
        .unwrap_or_default();
    if value.is_empty() {
        return Ok(DEFAULT_MIME_TYPE.to_string());
    }
    Ok(value.to_string())
}

/// Lower-cased extension including the dot; empty when there is none
///
/// Leading dots of the base name do not start an extension (`.wav` has none).
pub fn file_extension(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let stem_start = base.len() - base.trim_start_matches('.').len();
    match base[stem_start..].rfind('.') {
        Some(dot) => base[stem_start + dot..].to_lowercase(),
        None => String::new(),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}
