use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Download every photo of an infinite-scroll gallery, resumably.
#[derive(Debug, Parser)]
#[command(name = "gallery-harvest", version, about)]
pub struct Cli {
    /// Gallery page to harvest. Overrides --profile/--tab.
    #[arg(long)]
    pub url: Option<String>,

    /// Profile whose gallery to harvest when no --url is given.
    #[arg(long)]
    pub profile: Option<String>,

    /// Which gallery of the profile: photos by them or photos of them.
    #[arg(long, value_enum, default_value_t = GalleryTab::By)]
    pub tab: GalleryTab,

    /// Directory for downloaded media and the ledger.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// RON file with session, markup and download settings.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Skip items recorded by earlier runs.
    #[arg(long)]
    pub resume: bool,

    /// Stop after this many downloads.
    #[arg(long)]
    pub target_count: Option<u64>,

    #[arg(long)]
    pub max_scroll_attempts: Option<u32>,

    /// Viewport fraction per scroll step, in (0, 1].
    #[arg(long)]
    pub scroll_fraction: Option<f64>,

    /// WebDriver server, e.g. a running chromedriver.
    #[arg(long)]
    pub webdriver_url: Option<String>,

    #[arg(long)]
    pub headless: bool,

    /// Pause after opening the gallery until Enter is pressed.
    #[arg(long)]
    pub wait_for_enter: bool,

    /// Also write the log to this file.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GalleryTab {
    /// Photos uploaded by the profile.
    By,
    /// Photos the profile is tagged in.
    Of,
}

impl GalleryTab {
    pub fn path_segment(self) -> &'static str {
        match self {
            GalleryTab::By => "photos",
            GalleryTab::Of => "photos_of",
        }
    }
}
