use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use gallery_core::{MarkupRules, SessionConfig};
use gallery_engine::DownloadSettings;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

/// Everything a run needs, layered as defaults < config file < command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub output_dir: PathBuf,
    pub webdriver_url: String,
    pub headless: bool,
    /// Prefix for `--profile` galleries.
    pub profile_base_url: String,
    pub session: SessionConfig,
    pub markup: MarkupRules,
    pub download: DownloadOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("photos"),
            webdriver_url: "http://localhost:9515".to_string(),
            headless: false,
            profile_base_url: "https://www.facebook.com".to_string(),
            session: SessionConfig::default(),
            markup: MarkupRules::default(),
            download: DownloadOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadOptions {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub redirect_limit: usize,
    pub max_bytes: u64,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        let defaults = DownloadSettings::default();
        Self {
            connect_timeout_secs: defaults.connect_timeout.as_secs(),
            request_timeout_secs: defaults.request_timeout.as_secs(),
            redirect_limit: defaults.redirect_limit,
            max_bytes: defaults.max_bytes,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        ron::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Defaults, then `--config` if given, then flags.
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply(cli);
        config.session.validate().context("invalid session settings")?;
        Ok(config)
    }

    pub fn apply(&mut self, cli: &Cli) {
        if let Some(output) = &cli.output {
            self.output_dir = output.clone();
        }
        if let Some(url) = &cli.webdriver_url {
            self.webdriver_url = url.clone();
        }
        if cli.headless {
            self.headless = true;
        }
        if cli.resume {
            self.session.resume = true;
        }
        if let Some(target) = cli.target_count {
            self.session.target_count = Some(target);
        }
        if let Some(attempts) = cli.max_scroll_attempts {
            self.session.max_scroll_attempts = attempts;
        }
        if let Some(fraction) = cli.scroll_fraction {
            self.session.scroll_increment_fraction = fraction;
        }
    }

    /// `--url` as given, or the profile's gallery under `profile_base_url`.
    pub fn gallery_url(&self, cli: &Cli) -> Result<String> {
        if let Some(url) = &cli.url {
            return Ok(url.clone());
        }
        let Some(profile) = cli
            .profile
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
        else {
            bail!("either --url or --profile is required");
        };
        Ok(format!(
            "{}/{}/{}",
            self.profile_base_url.trim_end_matches('/'),
            profile.trim_matches('/'),
            cli.tab.path_segment()
        ))
    }

    pub fn download_settings(&self) -> DownloadSettings {
        DownloadSettings {
            connect_timeout: Duration::from_secs(self.download.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.download.request_timeout_secs),
            redirect_limit: self.download.redirect_limit,
            max_bytes: self.download.max_bytes,
            min_bytes: self.session.min_resource_bytes,
            ..DownloadSettings::default()
        }
    }
}
