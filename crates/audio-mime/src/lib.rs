use std::path::Path;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

// (extension, canonical content type, accepted aliases)
const TABLE: &[(&str, &str, &[&str])] = &[
    ("wav", "audio/wav", &["audio/wave", "audio/x-wav"]),
    ("mp3", "audio/mpeg", &["audio/mp3"]),
    ("ogg", "audio/ogg", &["audio/opus"]),
    ("flac", "audio/flac", &["audio/x-flac"]),
    ("m4a", "audio/mp4", &["audio/m4a", "audio/x-m4a"]),
    ("aac", "audio/aac", &[]),
    ("webm", "audio/webm", &["video/webm"]),
    ("mp4", "video/mp4", &[]),
    ("mov", "video/quicktime", &[]),
];

fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase()
}

/// File extension to hand providers that infer the format from a filename.
/// Unknown types fall back to `wav`.
pub fn content_type_to_extension(content_type: &str) -> &'static str {
    let mime = essence(content_type);
    TABLE
        .iter()
        .find(|(_, canonical, aliases)| *canonical == mime || aliases.contains(&mime.as_str()))
        .map(|(ext, _, _)| *ext)
        .unwrap_or("wav")
}

pub fn extension_to_content_type(extension: &str) -> &'static str {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    TABLE
        .iter()
        .find(|(e, _, _)| *e == ext)
        .map(|(_, canonical, _)| *canonical)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}

pub fn path_to_content_type(path: impl AsRef<Path>) -> &'static str {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(extension_to_content_type)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}
