use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const DEFAULT_IMAGE_MIME: &str = "image/png";

const DATA_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// An image carried as a `data:<mime>;base64,<payload>` URL.
///
/// The inference service consumes and produces base64 payloads, so the
/// reference keeps the encoded form and only decodes on request. Clones
/// share the underlying buffer.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ImageRef {
    url: Arc<str>,
}

impl ImageRef {
    /// Accepts a data URL or a bare base64 payload. Without a data-URL
    /// header the media type falls back to `image/png`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Some((mime, payload)) = split_data_url(trimmed) {
            return Self::from_parts(mime, payload);
        }
        let payload = trimmed
            .split_once(',')
            .map(|(_, rest)| rest)
            .unwrap_or(trimmed);
        Self::from_parts(DEFAULT_IMAGE_MIME, payload)
    }

    pub fn from_bytes(mime: &str, bytes: &[u8]) -> Self {
        Self::from_parts(mime, &BASE64.encode(bytes))
    }

    fn from_parts(mime: &str, payload: &str) -> Self {
        let mime = mime.trim();
        let mime = if mime.is_empty() {
            DEFAULT_IMAGE_MIME
        } else {
            mime
        };
        Self {
            url: Arc::from(format!("{DATA_PREFIX}{mime}{BASE64_MARKER}{payload}")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn mime_type(&self) -> &str {
        split_data_url(&self.url)
            .map(|(mime, _)| mime)
            .unwrap_or(DEFAULT_IMAGE_MIME)
    }

    pub fn base64_payload(&self) -> &str {
        split_data_url(&self.url)
            .map(|(_, payload)| payload)
            .unwrap_or_default()
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(self.base64_payload().as_bytes())
    }

    /// File extension matching the media type, for writing the image to disk.
    pub fn extension(&self) -> &'static str {
        let lowered = self.mime_type().to_ascii_lowercase();
        if lowered.contains("jpeg") || lowered.contains("jpg") {
            return "jpg";
        }
        if lowered.contains("webp") {
            return "webp";
        }
        "png"
    }
}

fn split_data_url(raw: &str) -> Option<(&str, &str)> {
    raw.strip_prefix(DATA_PREFIX)?.split_once(BASE64_MARKER)
}

impl fmt::Debug for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ImageRef({}, {} base64 chars)",
            self.mime_type(),
            self.base64_payload().len()
        )
    }
}

impl Serialize for ImageRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ImageRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}
