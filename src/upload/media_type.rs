use serde::{Deserialize, Serialize};
use std::fmt;

/// Media class derived from a file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Audio,
    File,
    Unknown,
}

const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".gif", ".jpeg", ".bmp", ".svg", ".webp"];
const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".avi", ".mov", ".wmv", ".flv", ".mkv", ".webm"];
const AUDIO_EXTENSIONS: &[&str] = &[".mp3", ".wav", ".ogg", ".wma", ".aac", ".flac", ".alac"];
const FILE_EXTENSIONS: &[&str] = &[".pdf", ".doc", ".docx", ".xls", ".xlsx", ".csv"];

const IMAGE_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];
const VIDEO_MIME_TYPES: &[&str] = &["video/mp4", "video/x-msvideo", "video/quicktime"];
const AUDIO_MIME_TYPES: &[&str] = &["audio/mpeg", "audio/wav", "audio/ogg"];
const FILE_MIME_TYPES: &[&str] = &["application/pdf", "application/msword", "application/vnd.ms-excel"];

impl MediaType {
    /// Classify a lowercase extension with its leading dot (".mp4")
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.to_ascii_lowercase();
        let ext = ext.as_str();
        if IMAGE_EXTENSIONS.contains(&ext) {
            MediaType::Image
        } else if VIDEO_EXTENSIONS.contains(&ext) {
            MediaType::Video
        } else if AUDIO_EXTENSIONS.contains(&ext) {
            MediaType::Audio
        } else if FILE_EXTENSIONS.contains(&ext) {
            MediaType::File
        } else {
            MediaType::Unknown
        }
    }

    /// Classify by the extension of a file name
    pub fn from_file_name(name: &str) -> Self {
        match extension_of(name) {
            Some(ext) => Self::from_extension(&ext),
            None => MediaType::Unknown,
        }
    }

    pub fn accepts_mime(&self, mime: &str) -> bool {
        let allowed = match self {
            MediaType::Image => IMAGE_MIME_TYPES,
            MediaType::Video => VIDEO_MIME_TYPES,
            MediaType::Audio => AUDIO_MIME_TYPES,
            MediaType::File => FILE_MIME_TYPES,
            MediaType::Unknown => return false,
        };
        // Ignore parameters such as "; charset=binary"
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        allowed.contains(&essence.as_str())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::File => "file",
            MediaType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ".ext" in lowercase, if the name has one
pub fn extension_of(name: &str) -> Option<String> {
    std::path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
}
