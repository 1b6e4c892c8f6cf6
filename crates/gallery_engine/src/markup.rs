use std::collections::HashSet;

use gallery_core::{ItemReference, MarkupRules};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Attributes a browser provider may set on each `img` with its natural size.
pub const RENDERED_WIDTH: &str = "data-rendered-width";
pub const RENDERED_HEIGHT: &str = "data-rendered-height";

#[derive(Debug, thiserror::Error)]
pub enum MarkupError {
    #[error("invalid selector `{selector}`: {message}")]
    Selector { selector: String, message: String },
}

/// Outcome of looking for the full-size media element on an item page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaResolution {
    Resolved(Url),
    /// Nothing usable rendered yet; keep polling.
    Pending,
    /// A media element exists but its source cannot be used.
    Malformed(String),
}

/// [`MarkupRules`] with selectors parsed once.
#[derive(Debug)]
pub struct CompiledMarkup {
    items: Selector,
    media: Vec<Selector>,
    include: Vec<String>,
    exclude: Vec<String>,
}

impl CompiledMarkup {
    pub fn new(rules: &MarkupRules) -> Result<Self, MarkupError> {
        // One selector group keeps matches in document order across all item selectors.
        let items = parse_selector(&rules.item_selectors.join(", "))?;
        let media = rules
            .media_selectors
            .iter()
            .map(|s| parse_selector(s))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            items,
            media,
            include: rules.include_substrings.clone(),
            exclude: rules.exclude_substrings.clone(),
        })
    }

    /// Item links in rendered order, absolute, without fragments or repeats.
    pub fn item_references(&self, html: &str, base_url: &str) -> Vec<ItemReference> {
        let document = Html::parse_document(html);
        let base = Url::parse(base_url).ok();
        let mut seen = HashSet::new();
        let mut references = Vec::new();

        for anchor in document.select(&self.items) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Some(mut url) = resolve_url(href, base.as_ref()) else {
                continue;
            };
            url.set_fragment(None);
            let url = String::from(url);

            if !self.include.is_empty() && !self.include.iter().any(|s| url.contains(s.as_str()))
            {
                continue;
            }
            if self.exclude.iter().any(|s| url.contains(s.as_str())) {
                continue;
            }
            if seen.insert(url.clone()) {
                references.push(ItemReference::new(url));
            }
        }
        references
    }

    /// Media selectors are tried in priority order; within one selector the
    /// largest image wins. Images with known dimensions below `min_pixels`
    /// and `data:` placeholders are ignored, as are images that have not
    /// loaded (`0x0`).
    pub fn resolve_media(&self, html: &str, base_url: &str, min_pixels: u64) -> MediaResolution {
        let document = Html::parse_document(html);
        let base = Url::parse(base_url).ok();

        for selector in &self.media {
            let mut best: Option<(Option<u64>, &str)> = None;
            for image in document.select(selector) {
                let Some(src) = image.value().attr("src").map(str::trim) else {
                    continue;
                };
                if src.is_empty() || src.starts_with("data:") {
                    continue;
                }
                let area = pixel_area(image);
                if area.is_some_and(|a| a == 0 || a < min_pixels) {
                    continue;
                }
                if best.is_none_or(|(best_area, _)| area > best_area) {
                    best = Some((area, src));
                }
            }

            if let Some((_, src)) = best {
                return match resolve_url(src, base.as_ref()) {
                    Some(url) if matches!(url.scheme(), "http" | "https") => {
                        MediaResolution::Resolved(url)
                    }
                    _ => MediaResolution::Malformed(format!("unusable media source `{src}`")),
                };
            }
        }
        MediaResolution::Pending
    }
}

fn parse_selector(selector: &str) -> Result<Selector, MarkupError> {
    Selector::parse(selector).map_err(|err| MarkupError::Selector {
        selector: selector.to_string(),
        message: err.to_string(),
    })
}

/// Rendered size when the browser annotated it, else the declared attributes.
fn pixel_area(element: ElementRef) -> Option<u64> {
    let rendered = dimension(element, RENDERED_WIDTH).zip(dimension(element, RENDERED_HEIGHT));
    let declared = || dimension(element, "width").zip(dimension(element, "height"));
    let (width, height) = rendered.or_else(declared)?;
    Some(width.saturating_mul(height))
}

fn dimension(element: ElementRef, name: &str) -> Option<u64> {
    element
        .value()
        .attr(name)
        .map(|v| v.trim().trim_end_matches("px"))
        .and_then(|v| v.parse::<u64>().ok())
}

fn resolve_url(reference: &str, base: Option<&Url>) -> Option<Url> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with('#') || lower.starts_with("javascript:") {
        return None;
    }
    if let Ok(url) = Url::parse(trimmed) {
        return Some(url);
    }
    base.and_then(|base| base.join(trimmed).ok())
}
