//! Raster images and audio references handed to providers.
//!
//! Acquisition (screenshots, clipboard) happens outside the core; by the
//! time an image reaches a provider it is just encoded bytes plus a
//! media type.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// An encoded raster image (PNG, JPEG, ...).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInput {
    /// IANA media type, e.g. `image/png`.
    pub media_type: String,

    /// The encoded image bytes.
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl ImageInput {
    pub fn new(media_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            media_type: media_type.into(),
            data,
        }
    }

    pub fn png(data: Vec<u8>) -> Self {
        Self::new("image/png", data)
    }

    /// Read an image file, inferring the media type from its extension.
    pub fn from_path(path: &Path) -> crate::Result<Self> {
        let media_type = image_media_type(path).ok_or_else(|| {
            crate::Error::InvalidInput(format!("Unsupported image type: {}", path.display()))
        })?;
        let data = std::fs::read(path)?;
        Ok(Self::new(media_type, data))
    }

    /// Standard base64 of the image bytes.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    /// `data:` URL form used by OpenAI-style APIs.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.to_base64())
    }
}

impl std::fmt::Debug for ImageInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageInput")
            .field("media_type", &self.media_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Media type for a supported image extension.
pub fn image_media_type(path: &Path) -> Option<&'static str> {
    match extension(path)?.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// Media type for a supported audio extension.
pub fn audio_media_type(path: &Path) -> Option<&'static str> {
    match extension(path)?.as_str() {
        "wav" => Some("audio/wav"),
        "mp3" => Some("audio/mp3"),
        "ogg" => Some("audio/ogg"),
        "flac" => Some("audio/flac"),
        "m4a" | "aac" => Some("audio/aac"),
        _ => None,
    }
}

/// Load an audio file for inline upload. Errors are provider-level so a
/// bad path surfaces in-band like any other backend failure.
pub fn read_audio(path: &Path) -> std::result::Result<(String, Vec<u8>), ProviderError> {
    let media_type = audio_media_type(path).ok_or_else(|| {
        ProviderError::InvalidInput(format!("Unsupported audio type: {}", path.display()))
    })?;
    let data = std::fs::read(path).map_err(|e| {
        ProviderError::InvalidInput(format!("Cannot read audio file {}: {e}", path.display()))
    })?;
    Ok((media_type.to_string(), data))
}

/// Text appended for backends that cannot ingest audio directly.
pub fn audio_note(path: &Path) -> String {
    format!(
        "\n[Audio file provided: {}. Please note: audio processing requires transcription first.]",
        path.display()
    )
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
