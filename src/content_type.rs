//! Extension to MIME type lookup for streamed media.

/// Served when the extension is unknown or missing. Most players sniff the
/// container anyway, and mp4 is what the downloader prefers.
pub const DEFAULT_CONTENT_TYPE: &str = "video/mp4";

/// Returns the `Content-Type` for a file extension (without the leading dot).
pub fn content_type_for(extension: Option<&str>) -> &'static str {
    let Some(ext) = extension else {
        return DEFAULT_CONTENT_TYPE;
    };

    match ext.to_ascii_lowercase().as_str() {
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "flv" => "video/x-flv",
        "wmv" => "video/x-ms-wmv",
        "m4v" => "video/x-m4v",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

/// Extensions the library index treats as playable video.
pub fn is_video_extension(ext: &str) -> bool {
    matches!(
        ext.to_ascii_lowercase().as_str(),
        "mp4" | "mkv" | "avi" | "mov" | "wmv" | "flv" | "webm" | "m4v"
    )
}
