//! Uploaded file record

use std::path::PathBuf;

/// A file extracted from a multipart/form-data request and written to storage
///
/// The payload bytes live in the store; `stored_path` is the handle later
/// stages use to read them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Filename as sent by the client
    pub original_filename: String,
    /// Storage location of the payload
    pub stored_path: PathBuf,
    /// MIME type from the part's Content-Type header (`text/plain` if absent)
    pub mime_type: String,
    /// Lower-cased extension including the dot, e.g. `.mp3`
    pub extension: String,
}
