use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("scroll_increment_fraction must be in (0, 1], got {0}")]
    ScrollFraction(f64),
    #[error("settle_interval_range must satisfy 0 <= min <= max, got ({min}, {max})")]
    SettleRange { min: f64, max: f64 },
    #[error("{field} must be a finite, non-negative number of seconds, got {value}")]
    Seconds { field: &'static str, value: f64 },
    #[error("{field} must be at least 1")]
    Zero { field: &'static str },
    #[error("max_fetch_attempts allows at most one retry ({MAX_FETCH_ATTEMPTS}), got {0}")]
    FetchAttempts(u32),
}

/// One attempt plus at most one retry after a transient failure.
pub const MAX_FETCH_ATTEMPTS: u32 = 2;

/// Options recognized by a harvest session.
///
/// Durations are stored as seconds so that config files stay readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub max_scroll_attempts: u32,
    pub scroll_increment_fraction: f64,
    pub scroll_steps: u32,
    pub scroll_step_pause_secs: f64,
    pub settle_interval_range: (f64, f64),
    pub resume: bool,
    pub target_count: Option<u64>,
    pub max_stale_advances: u32,
    pub max_fetch_attempts: u32,
    pub resource_timeout_secs: f64,
    pub poll_interval_secs: f64,
    pub min_media_pixels: u64,
    pub min_resource_bytes: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_scroll_attempts: 300,
            scroll_increment_fraction: 0.5,
            scroll_steps: 3,
            scroll_step_pause_secs: 1.0,
            settle_interval_range: (3.0, 6.0),
            resume: false,
            target_count: None,
            max_stale_advances: 3,
            max_fetch_attempts: MAX_FETCH_ATTEMPTS,
            resource_timeout_secs: 10.0,
            poll_interval_secs: 0.5,
            min_media_pixels: 40_000,
            min_resource_bytes: 1_000,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fraction = self.scroll_increment_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(ConfigError::ScrollFraction(fraction));
        }
        let (min, max) = self.settle_interval_range;
        if !(min.is_finite() && max.is_finite() && min >= 0.0 && min <= max) {
            return Err(ConfigError::SettleRange { min, max });
        }
        for (field, value) in [
            ("scroll_step_pause_secs", self.scroll_step_pause_secs),
            ("resource_timeout_secs", self.resource_timeout_secs),
            ("poll_interval_secs", self.poll_interval_secs),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Seconds { field, value });
            }
        }
        for (field, value) in [
            ("max_scroll_attempts", self.max_scroll_attempts),
            ("scroll_steps", self.scroll_steps),
            ("max_stale_advances", self.max_stale_advances),
            ("max_fetch_attempts", self.max_fetch_attempts),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        if self.max_fetch_attempts > MAX_FETCH_ATTEMPTS {
            return Err(ConfigError::FetchAttempts(self.max_fetch_attempts));
        }
        Ok(())
    }

    pub fn scroll_step_pause(&self) -> Duration {
        seconds(self.scroll_step_pause_secs)
    }

    pub fn settle_bounds(&self) -> (Duration, Duration) {
        let (min, max) = self.settle_interval_range;
        (seconds(min), seconds(max))
    }

    pub fn resource_timeout(&self) -> Duration {
        seconds(self.resource_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        seconds(self.poll_interval_secs)
    }

    pub fn limits(&self) -> SessionLimits {
        SessionLimits {
            target_count: self.target_count,
            max_fetch_attempts: self.max_fetch_attempts,
        }
    }
}

// Invalid values collapse to zero; `validate` is where they get reported.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}

/// The part of [`SessionConfig`] the state machine itself enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub target_count: Option<u64>,
    pub max_fetch_attempts: u32,
}

impl Default for SessionLimits {
    fn default() -> Self {
        SessionConfig::default().limits()
    }
}

/// How gallery entries and full-size media are found in rendered markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkupRules {
    /// CSS selectors for anchors that lead to a single item.
    pub item_selectors: Vec<String>,
    /// A candidate href must contain at least one of these.
    pub include_substrings: Vec<String>,
    /// A candidate href containing any of these is dropped (albums, collections).
    pub exclude_substrings: Vec<String>,
    /// CSS selectors for the full-size media element, in priority order.
    pub media_selectors: Vec<String>,
    /// Query parameters that carry an item id.
    pub id_query_params: Vec<String>,
}

impl Default for MarkupRules {
    fn default() -> Self {
        Self {
            item_selectors: vec![
                "a[href*='/photos/']".to_string(),
                "a[href*='/photo/']".to_string(),
                "a[href*='fbid=']".to_string(),
            ],
            include_substrings: vec![
                "/photos/".to_string(),
                "/photo/".to_string(),
                "fbid=".to_string(),
            ],
            exclude_substrings: vec!["/photos/a.".to_string(), "/photos/albums/".to_string()],
            media_selectors: vec![
                "img[data-visualcompletion='media-vc-image']".to_string(),
                "img.x1ey2m1c".to_string(),
                "img[style*='max-height']".to_string(),
                "div[role='dialog'] img".to_string(),
                "div[data-pagelet*='MediaViewer'] img".to_string(),
            ],
            id_query_params: vec![
                "fbid".to_string(),
                "photo_id".to_string(),
                "id".to_string(),
            ],
        }
    }
}
