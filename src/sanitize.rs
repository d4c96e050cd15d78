//! Filename helpers: turning media titles into on-disk names and on-disk
//! names into response headers.

use std::path::Path;

pub const DEFAULT_TITLE_MAX_LENGTH: usize = 30;

const ILLEGAL_CHARACTERS: [char; 8] = ['/', ':', '*', '?', '"', '<', '>', '|'];

/// Reduces a media title to ASCII letters, digits and single spaces, at most
/// `max_length` characters long.
///
/// The result can be empty when the title has no ASCII alphanumeric content;
/// callers decide what to do with that.
pub fn sanitize_filename(title: &str, max_length: usize) -> String {
    let without_illegal: String = title
        .chars()
        .filter(|character| !ILLEGAL_CHARACTERS.contains(character))
        .collect();

    let collapsed = without_illegal.split_whitespace().collect::<Vec<_>>().join(" ");

    let kept: String = collapsed
        .chars()
        .filter(|character| character.is_ascii_alphanumeric() || character.is_whitespace())
        .collect();

    // Only ASCII survives the previous step, so chars and bytes line up.
    let truncated: String = kept.chars().take(max_length).collect();
    truncated.trim().to_string()
}

/// Keeps only ASCII alphanumerics of a container extension reported by the
/// extractor.
pub fn sanitize_extension(ext: &str) -> Option<String> {
    let cleaned: String = ext
        .trim()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(10)
        .collect::<String>()
        .to_ascii_lowercase();

    if cleaned.is_empty() { None } else { Some(cleaned) }
}

pub fn content_type_for_filename(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "wav" => "audio/wav",
        "ogg" | "opus" => "audio/ogg",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}

pub fn build_content_disposition(filename: &str) -> String {
    let safe_ascii = sanitize_ascii_filename(filename);
    format!(
        "attachment; filename=\"{safe_ascii}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}

pub fn sanitize_ascii_filename(value: &str) -> String {
    let sanitized: String = value
        .chars()
        .map(|character| {
            if character.is_ascii_alphanumeric()
                || matches!(character, '.' | '-' | '_' | ' ' | '(' | ')')
            {
                character
            } else {
                '_'
            }
        })
        .collect();

    let compact = sanitized.trim();
    if compact.is_empty() {
        "download.bin".to_string()
    } else {
        compact.to_string()
    }
}
