//! Binary media as self-describing data URIs
//!
//! Media crosses every boundary as `data:<mime-type>;base64,<payload>`.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DataUriError {
    #[error("not a data URI (expected 'data:<mime-type>;base64,<payload>')")]
    MissingScheme,

    #[error("data URI is missing the ',' payload separator")]
    MissingPayload,

    #[error("data URI must be base64 encoded")]
    NotBase64,

    #[error("data URI has an empty mime type")]
    EmptyMimeType,

    #[error("invalid base64 payload: {0}")]
    InvalidPayload(String),
}

/// Decoded data URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    mime_type: String,
    data: Vec<u8>,
}

impl DataUri {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Build from an already base64-encoded payload, as returned by model APIs
    pub fn from_base64(mime_type: impl Into<String>, payload: &str) -> Result<Self, DataUriError> {
        let data = BASE64
            .decode(payload.trim())
            .map_err(|e| DataUriError::InvalidPayload(e.to_string()))?;
        Ok(Self::new(mime_type, data))
    }

    pub fn parse(uri: &str) -> Result<Self, DataUriError> {
        let rest = uri
            .trim()
            .strip_prefix("data:")
            .ok_or(DataUriError::MissingScheme)?;
        let (header, payload) = rest.split_once(',').ok_or(DataUriError::MissingPayload)?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or(DataUriError::NotBase64)?;
        if mime_type.is_empty() {
            return Err(DataUriError::EmptyMimeType);
        }

        Self::from_base64(mime_type, payload)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Payload alone, base64 encoded
    pub fn base64_payload(&self) -> String {
        BASE64.encode(&self.data)
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.base64_payload())
    }
}

impl FromStr for DataUri {
    type Err = DataUriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for DataUri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DataUri {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
