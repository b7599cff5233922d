use anyhow::{Result, anyhow};

/// Media types the service knows a file extension for.
///
/// The upload endpoint narrows this further through
/// `UploadConfig::allowed_media_types`.
pub const KNOWN_MEDIA_TYPES: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("video/mp4", "mp4"),
];

/// Returns the file extension (without the dot) for a media type.
pub fn extension_of(media_type: &str) -> Result<&'static str> {
    KNOWN_MEDIA_TYPES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(media_type))
        .map(|(_, ext)| *ext)
        .ok_or_else(|| anyhow!("unsupported media type: {}", media_type))
}

/// Parses a declared `Content-Type` value down to its lowercase essence,
/// dropping parameters such as `charset` or `codecs`.
pub fn parse_media_type(content_type: &str) -> Result<String> {
    let trimmed = content_type.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("empty content type"));
    }

    let parsed: mime::Mime = trimmed
        .parse()
        .map_err(|e| anyhow!("invalid content type '{}': {}", trimmed, e))?;

    Ok(parsed.essence_str().to_lowercase())
}
