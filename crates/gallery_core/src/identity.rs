use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

const MAX_IDENTITY_LEN: usize = 120;

/// Path segments that name a gallery route rather than an item.
const GENERIC_SEGMENTS: &[&str] = &["photo", "photos", "photos_of", "media", "image", "images"];

const MEDIA_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "heic", "avif", "bmp", "tif", "tiff", "mp4", "webm",
    "mov",
];

/// `_640x480`, `-1024x768` and `@2x`.
static SIZE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:[_-]\d+x\d+|@\d+x)$").expect("valid size regex"));

/// Media CDN names such as `123456_789_n`: numeric stem plus a one-letter size code.
static CDN_SIZE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:_\d+)*)_[a-z]$").expect("valid size code regex"));

/// Locator for one gallery entry as currently rendered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemReference(String);

impl ItemReference {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemReference {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ItemReference {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Stable dedup key for one media item. Always filesystem-safe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemIdentity(String);

impl ItemIdentity {
    /// Accepts an already-normalized key, e.g. one read back from durable storage.
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_IDENTITY_LEN
            && !raw.starts_with('.')
            && raw.chars().all(is_identity_char);
        valid.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no identity-bearing segment in {reference}: {reason}")]
pub struct MalformedReferenceError {
    pub reference: String,
    pub reason: String,
}

impl MalformedReferenceError {
    fn new(reference: &ItemReference, reason: impl Into<String>) -> Self {
        Self {
            reference: reference.to_string(),
            reason: reason.into(),
        }
    }
}

/// Derives [`ItemIdentity`] values from references.
///
/// An id-bearing query parameter wins over the path; otherwise the last
/// meaningful path segment is used with its extension and size-variant
/// suffixes removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityResolver {
    id_query_params: Vec<String>,
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new(vec![
            "fbid".to_string(),
            "photo_id".to_string(),
            "id".to_string(),
        ])
    }
}

impl IdentityResolver {
    pub fn new(id_query_params: Vec<String>) -> Self {
        Self { id_query_params }
    }

    pub fn identity_of(
        &self,
        reference: &ItemReference,
    ) -> Result<ItemIdentity, MalformedReferenceError> {
        let url = Url::parse(reference.as_str().trim())
            .map_err(|err| MalformedReferenceError::new(reference, err.to_string()))?;

        for param in &self.id_query_params {
            let value = url
                .query_pairs()
                .find(|(key, _)| key.eq_ignore_ascii_case(param))
                .map(|(_, value)| sanitize(value.trim()));
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                return Ok(ItemIdentity(value));
            }
        }

        let segment = url
            .path_segments()
            .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
            .ok_or_else(|| MalformedReferenceError::new(reference, "reference has no path"))?;

        if GENERIC_SEGMENTS
            .iter()
            .any(|generic| generic.eq_ignore_ascii_case(segment))
        {
            return Err(MalformedReferenceError::new(
                reference,
                format!("segment `{segment}` names a route, not an item"),
            ));
        }

        let key = sanitize(strip_size_suffixes(strip_extension(segment)));
        if key.is_empty() {
            return Err(MalformedReferenceError::new(
                reference,
                "segment is empty after normalization",
            ));
        }
        Ok(ItemIdentity(key))
    }
}

/// Resolves with the default id-bearing query parameters.
pub fn identity_of(reference: &ItemReference) -> Result<ItemIdentity, MalformedReferenceError> {
    IdentityResolver::default().identity_of(reference)
}

fn strip_extension(segment: &str) -> &str {
    match segment.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && MEDIA_EXTENSIONS
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext)) =>
        {
            stem
        }
        _ => segment,
    }
}

fn strip_size_suffixes(stem: &str) -> &str {
    let mut current = stem;
    while let Some(found) = SIZE_SUFFIX.find(current) {
        let shorter = &current[..found.start()];
        if shorter.is_empty() {
            break;
        }
        current = shorter;
    }
    match CDN_SIZE_CODE.captures(current).and_then(|caps| caps.get(1)) {
        Some(stem) => stem.as_str(),
        None => current,
    }
}

fn is_identity_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

fn sanitize(input: &str) -> String {
    let mut compacted = String::with_capacity(input.len());
    let mut prev_underscore = false;
    for c in input.chars() {
        let c = if is_identity_char(c) { c } else { '_' };
        if c == '_' {
            if !prev_underscore {
                compacted.push(c);
            }
            prev_underscore = true;
        } else {
            compacted.push(c);
            prev_underscore = false;
        }
    }
    let mut cleaned = compacted.trim_matches(&['_', '.'][..]).to_string();
    if cleaned.len() > MAX_IDENTITY_LEN {
        cleaned.truncate(MAX_IDENTITY_LEN);
    }
    if is_reserved_windows_name(&cleaned) {
        cleaned.push('_');
    }
    cleaned
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_suffixes_strip_repeatedly_but_never_to_empty() {
        assert_eq!(strip_size_suffixes("123_456_n"), "123_456");
        assert_eq!(strip_size_suffixes("sunset-1024x768@2x"), "sunset");
        assert_eq!(strip_size_suffixes("_n"), "_n");
        assert_eq!(strip_size_suffixes("123_456_n@2x"), "123_456");
    }

    #[test]
    fn letter_codes_only_strip_from_numeric_stems() {
        assert_eq!(strip_size_suffixes("beach_a"), "beach_a");
        assert_eq!(strip_size_suffixes("trip_2024_x"), "trip_2024_x");
        assert_eq!(strip_size_suffixes("123_o"), "123");
    }

    #[test]
    fn sanitize_collapses_forbidden_runs() {
        assert_eq!(sanitize("a b%%c"), "a_b_c");
        assert_eq!(sanitize("..x.."), "x");
        assert_eq!(sanitize("con"), "con_");
    }

    #[test]
    fn parse_rejects_unsafe_keys() {
        assert!(ItemIdentity::parse("12345").is_some());
        assert!(ItemIdentity::parse("").is_none());
        assert!(ItemIdentity::parse("../etc").is_none());
        assert!(ItemIdentity::parse("a b").is_none());
    }
}
