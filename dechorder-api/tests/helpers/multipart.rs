//! Raw multipart/form-data request bodies

pub const BOUNDARY: &str = "----dechorderTestBoundary7MA4YWxkTrZu0gW";

pub fn content_type_header() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}

/// Single-part body carrying `payload` as file field `field`
pub fn multipart_body(field: &str, filename: &str, content_type: Option<&str>, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    if let Some(content_type) = content_type {
        body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
    }
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// Body with the audio file under the expected `audio-file` field
pub fn audio_upload(filename: &str, payload: &[u8]) -> Vec<u8> {
    multipart_body("audio-file", filename, Some("audio/wav"), payload)
}
