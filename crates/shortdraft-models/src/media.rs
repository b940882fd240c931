//! Supported video container types.

use std::path::Path;

/// File extensions accepted as video input, lowercase without the dot.
pub const VIDEO_EXTENSIONS: [&str; 7] = ["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm"];

/// MIME types a remote store may report for accepted videos.
pub const VIDEO_MIME_TYPES: [&str; 7] = [
    "video/mp4",
    "video/avi",
    "video/quicktime",
    "video/x-msvideo",
    "video/x-ms-wmv",
    "video/x-flv",
    "video/webm",
];

/// True when the name ends in a supported video extension (any case).
pub fn has_video_extension(name: impl AsRef<Path>) -> bool {
    name.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

pub fn is_video_mime_type(mime_type: &str) -> bool {
    VIDEO_MIME_TYPES.contains(&mime_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_matching() {
        assert!(has_video_extension("talk.mp4"));
        assert!(has_video_extension("TALK.MOV"));
        assert!(has_video_extension("/tmp/a.b.webm"));
        assert!(!has_video_extension("notes.txt"));
        assert!(!has_video_extension("mp4"));
    }

    #[test]
    fn test_mime_matching() {
        assert!(is_video_mime_type("video/quicktime"));
        assert!(!is_video_mime_type("application/pdf"));
    }
}
