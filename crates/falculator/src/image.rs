use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use thiserror::Error;

/// Gemini rejects inline data above this size.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

const DEFAULT_MIME_TYPE: &str = "image/png";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImageError {
    #[error("Missing or invalid 'image' field. Expected base64 string.")]
    Empty,

    #[error("Invalid base64 image data")]
    InvalidBase64,

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Image too large: {size} bytes (max: {max} bytes)")]
    TooLarge { size: usize, max: usize },
}

/// A screenshot ready to be attached to a provider request. `data` is plain
/// base64 without any data-URL prefix.
#[derive(Clone, PartialEq)]
pub struct ImagePayload {
    data: String,
    mime_type: String,
    size: usize,
}

impl std::fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime_type", &self.mime_type)
            .field("size", &self.size)
            .finish()
    }
}

impl ImagePayload {
    /// Accepts raw base64 or a `data:image/...;base64,` URL.
    pub fn from_base64(input: &str, max_bytes: usize) -> Result<Self, ImageError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ImageError::Empty);
        }

        let (declared_mime, encoded) = match input.strip_prefix("data:") {
            Some(rest) => {
                let (header, encoded) = rest.split_once(',').ok_or(ImageError::InvalidBase64)?;
                let mime = header
                    .strip_suffix(";base64")
                    .ok_or(ImageError::InvalidBase64)?;
                if !mime.starts_with("image/") {
                    return Err(ImageError::UnsupportedMediaType(mime.to_string()));
                }
                (Some(mime.to_string()), encoded)
            }
            None => (None, input),
        };

        let bytes = BASE64
            .decode(encoded)
            .map_err(|_| ImageError::InvalidBase64)?;
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        if bytes.len() > max_bytes {
            return Err(ImageError::TooLarge {
                size: bytes.len(),
                max: max_bytes,
            });
        }

        let mime_type = declared_mime
            .or_else(|| sniff_mime_type(&bytes).map(str::to_string))
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());

        Ok(Self {
            data: encoded.to_string(),
            mime_type,
            size: bytes.len(),
        })
    }

    pub fn from_bytes(bytes: &[u8], max_bytes: usize) -> Result<Self, ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        if bytes.len() > max_bytes {
            return Err(ImageError::TooLarge {
                size: bytes.len(),
                max: max_bytes,
            });
        }
        Ok(Self {
            data: BASE64.encode(bytes),
            mime_type: sniff_mime_type(bytes)
                .unwrap_or(DEFAULT_MIME_TYPE)
                .to_string(),
            size: bytes.len(),
        })
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

fn sniff_mime_type(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => Some("image/png"),
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        _ => None,
    }
}
