//! Frame types exchanged through the store
//!
//! A [`Frame`] is keyed by `(session_id, index)`. Everything else on it is
//! descriptive metadata that the store carries but never interprets.
//!
//! The serde representation is the persisted wire format: PascalCase field
//! names, base64 payload, RFC 3339 timestamp.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of media carried by a frame
///
/// Serialized as its lowercase name. Any other name a foreign producer wrote
/// is kept verbatim in [`MediaType::Other`] and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MediaType {
    #[default]
    Video,
    Audio,
    Other(String),
}

impl MediaType {
    pub fn as_str(&self) -> &str {
        match self {
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Other(name) => name,
        }
    }
}

impl From<String> for MediaType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "video" => MediaType::Video,
            "audio" => MediaType::Audio,
            _ => MediaType::Other(name),
        }
    }
}

impl From<MediaType> for String {
    fn from(media_type: MediaType) -> Self {
        match media_type {
            MediaType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Well-known codecs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecType {
    H264,
    Vp8,
    Vp9,
    Opus,
    Aac,
}

impl CodecType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodecType::H264 => "h264",
            CodecType::Vp8 => "vp8",
            CodecType::Vp9 => "vp9",
            CodecType::Opus => "opus",
            CodecType::Aac => "aac",
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, CodecType::H264 | CodecType::Vp8 | CodecType::Vp9)
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, CodecType::Opus | CodecType::Aac)
    }

    /// Media type implied by the codec
    pub fn media_type(&self) -> MediaType {
        if self.is_video() {
            MediaType::Video
        } else {
            MediaType::Audio
        }
    }
}

impl fmt::Display for CodecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodecType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "h264" => Ok(CodecType::H264),
            "vp8" => Ok(CodecType::Vp8),
            "vp9" => Ok(CodecType::Vp9),
            "opus" => Ok(CodecType::Opus),
            "aac" => Ok(CodecType::Aac),
            other => Err(format!("unknown codec: {}", other)),
        }
    }
}

/// A unit of media data
///
/// Cheap to clone: the payload is a reference-counted `Bytes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Partition key; must be non-empty
    #[serde(rename = "SessionID")]
    pub session_id: String,

    /// Ordering key within the session, assigned by the producer
    #[serde(rename = "Index")]
    pub index: i64,

    /// Opaque payload
    #[serde(rename = "Data", with = "payload")]
    pub data: Bytes,

    /// Capture time
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,

    #[serde(rename = "MediaType")]
    pub media_type: MediaType,

    /// Codec name, e.g. "h264", "opus", "jpeg"
    #[serde(rename = "Codec", default)]
    pub codec: String,

    #[serde(rename = "KeyFrame", default)]
    pub key_frame: bool,
}

impl Frame {
    /// Create a frame stamped with the current time
    pub fn new(
        session_id: impl Into<String>,
        index: i64,
        data: impl Into<Bytes>,
        media_type: MediaType,
        codec: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            index,
            data: data.into(),
            timestamp: Utc::now(),
            media_type,
            codec: codec.into(),
            key_frame: false,
        }
    }

    /// Create a video frame
    pub fn video(session_id: impl Into<String>, index: i64, data: impl Into<Bytes>) -> Self {
        Self::new(session_id, index, data, MediaType::Video, "")
    }

    /// Create an audio frame
    pub fn audio(session_id: impl Into<String>, index: i64, data: impl Into<Bytes>) -> Self {
        Self::new(session_id, index, data, MediaType::Audio, "")
    }

    /// Set the codec
    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = codec.into();
        self
    }

    /// Mark as keyframe
    pub fn key_frame(mut self, key_frame: bool) -> Self {
        self.key_frame = key_frame;
        self
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Base64 payload encoding; a JSON `null` decodes as an empty payload.
mod payload {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => STANDARD
                .decode(encoded.as_bytes())
                .map(Bytes::from)
                .map_err(serde::de::Error::custom),
            None => Ok(Bytes::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_wire_field_names() {
        let frame = Frame::video("cam1", 7, Bytes::from_static(b"abc"))
            .with_codec("h264")
            .key_frame(true);

        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["SessionID"], "cam1");
        assert_eq!(json["Index"], 7);
        assert_eq!(json["Data"], "YWJj");
        assert_eq!(json["MediaType"], "video");
        assert_eq!(json["Codec"], "h264");
        assert_eq!(json["KeyFrame"], true);
        assert!(json["Timestamp"].is_string());
    }

    #[test]
    fn test_frame_decodes_null_payload_and_unknown_media_type() {
        let raw = r#"{"SessionID":"s","Index":3,"Data":null,
            "Timestamp":"2024-01-02T03:04:05.123456789Z","MediaType":"",
            "Codec":"","KeyFrame":false}"#;

        let frame: Frame = serde_json::from_str(raw).unwrap();
        assert_eq!(frame.index, 3);
        assert!(frame.data.is_empty());
        assert_eq!(frame.media_type, MediaType::Other(String::new()));
    }

    #[test]
    fn test_unknown_media_type_written_back_unchanged() {
        let raw = r#"{"SessionID":"s","Index":0,"Data":"","Timestamp":"2024-01-02T03:04:05Z",
            "MediaType":"Subtitle","Codec":"","KeyFrame":false}"#;

        let frame: Frame = serde_json::from_str(raw).unwrap();
        assert_eq!(frame.media_type, MediaType::Other("Subtitle".into()));

        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["MediaType"], "Subtitle");

        let empty = MediaType::from(String::new());
        assert_eq!(String::from(empty), "");
        assert_eq!(String::from(MediaType::Audio), "audio");
    }

    #[test]
    fn test_frame_rejects_bad_base64() {
        let raw = r#"{"SessionID":"s","Index":0,"Data":"!!!",
            "Timestamp":"2024-01-02T03:04:05Z","MediaType":"audio"}"#;

        assert!(serde_json::from_str::<Frame>(raw).is_err());
    }

    #[test]
    fn test_codec_type() {
        assert!(CodecType::H264.is_video());
        assert!(CodecType::Opus.is_audio());
        assert!(!CodecType::Aac.is_video());
        assert_eq!(CodecType::Vp9.media_type(), MediaType::Video);
        assert_eq!("OPUS".parse::<CodecType>(), Ok(CodecType::Opus));
        assert!("mjpeg".parse::<CodecType>().is_err());
    }
}
