use std::path::Path;

/// Extension assumed for media whose name carries none.
pub const DEFAULT_MEDIA_EXTENSION: &str = ".mp3";

const MAX_EXTENSION_LEN: usize = 5;

/// Dotted extension of a local file, or the default.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(normalize)
        .unwrap_or_else(|| DEFAULT_MEDIA_EXTENSION.to_string())
}

/// Dotted extension of the last path segment of a URL, or the default.
/// Query strings and fragments are ignored.
pub fn extension_from_locator(locator: &str) -> String {
    let without_query = locator
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let after_scheme = without_query
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(without_query);

    // The first segment after the scheme is the host, which never carries an extension.
    let last_segment = match after_scheme.split_once('/') {
        Some((_, path)) => path.rsplit('/').next().unwrap_or_default(),
        None if locator.contains("://") => "",
        None => after_scheme,
    };

    last_segment
        .rsplit_once('.')
        .and_then(|(stem, ext)| if stem.is_empty() { None } else { normalize(ext) })
        .unwrap_or_else(|| DEFAULT_MEDIA_EXTENSION.to_string())
}

fn normalize(ext: &str) -> Option<String> {
    let valid = !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| format!(".{}", ext.to_ascii_lowercase()))
}
