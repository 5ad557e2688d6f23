//! Image payload types accepted by the gate

use crate::error::{Error, Result};
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use bytes::Bytes;

/// Largest compressed payload accepted, in bytes (20 MiB)
pub const MAX_PAYLOAD_BYTES: usize = 20 * 1024 * 1024;

/// An image as handed over by the request layer.
///
/// Callers never need to normalize the payload themselves: raw encoded bytes
/// and base64 text (optionally a `data:image/...;base64,` URL) are both accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageInput {
    /// Encoded image bytes (JPEG, PNG, WebP, ...)
    Bytes(Bytes),

    /// Base64 text of encoded image bytes
    Base64(String),
}

impl ImageInput {
    /// Create from raw encoded bytes
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self::Bytes(bytes.into())
    }

    /// Create from base64 text or a data URL
    pub fn from_base64(text: impl Into<String>) -> Self {
        Self::Base64(text.into())
    }

    /// Check whether the payload carries no data at all
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Bytes(bytes) => bytes.is_empty(),
            Self::Base64(text) => base64_body(text).trim().is_empty(),
        }
    }

    /// Payload kind, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bytes(_) => "bytes",
            Self::Base64(_) => "base64",
        }
    }

    /// Resolve the payload to encoded image bytes.
    ///
    /// Fails with [`Error::InvalidInput`] when the payload is empty, exceeds
    /// [`MAX_PAYLOAD_BYTES`], or is not valid base64.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let bytes = match self {
            Self::Bytes(bytes) => bytes.clone(),
            Self::Base64(text) => decode_base64(text)?,
        };

        if bytes.is_empty() {
            return Err(Error::invalid_input("image payload is empty"));
        }
        if bytes.len() > MAX_PAYLOAD_BYTES {
            return Err(Error::invalid_input(format!(
                "image payload too large: {} bytes (max: {})",
                bytes.len(),
                MAX_PAYLOAD_BYTES
            )));
        }

        Ok(bytes)
    }
}

impl From<Bytes> for ImageInput {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for ImageInput {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<&[u8]> for ImageInput {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(Bytes::copy_from_slice(bytes))
    }
}

impl From<String> for ImageInput {
    fn from(text: String) -> Self {
        Self::Base64(text)
    }
}

impl From<&str> for ImageInput {
    fn from(text: &str) -> Self {
        Self::Base64(text.to_string())
    }
}

/// Strip a `data:<mime>;base64,` prefix if present
fn base64_body(text: &str) -> &str {
    let trimmed = text.trim_start();
    if trimmed.starts_with("data:") {
        if let Some((_, body)) = trimmed.split_once(',') {
            return body;
        }
    }
    trimmed
}

fn decode_base64(text: &str) -> Result<Bytes> {
    let body = base64_body(text);

    // Line-wrapped base64 (MIME style) is common from mobile clients
    let compact: String = body
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let compact = compact.trim_end_matches('=');

    if compact.is_empty() {
        return Err(Error::invalid_input("image payload is empty"));
    }
    if compact.len() / 4 * 3 > MAX_PAYLOAD_BYTES {
        return Err(Error::invalid_input(format!(
            "image payload too large: ~{} bytes (max: {})",
            compact.len() / 4 * 3,
            MAX_PAYLOAD_BYTES
        )));
    }

    let engine = if compact.contains(['-', '_']) {
        &URL_SAFE_NO_PAD
    } else {
        &STANDARD_NO_PAD
    };

    engine
        .decode(compact)
        .map(Bytes::from)
        .map_err(|e| Error::invalid_input(format!("payload is not valid base64: {e}")))
}
