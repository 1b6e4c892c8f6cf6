//! Summary of the last run, kept next to the media as `.harvest_summary.ron`.

use std::fs;
use std::path::Path;

use gallery_core::ProgressReport;
use gallery_engine::AtomicFileWriter;
use gallery_logging::{harvest_error, harvest_warn};
use serde::{Deserialize, Serialize};

pub const SUMMARY_FILENAME: &str = ".harvest_summary.ron";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub gallery_url: String,
    pub started_utc: String,
    pub finished_utc: String,
    /// `None` when the run ended because the gallery window was lost.
    pub end_reason: Option<String>,
    pub discovered: u64,
    pub downloaded: u64,
    pub skipped_already_present: u64,
    pub already_absent: u64,
    pub malformed: u64,
    pub permanent_failures: u64,
    pub ledger_total: usize,
}

impl RunSummary {
    pub fn new(
        gallery_url: &str,
        started_utc: String,
        finished_utc: String,
        report: &ProgressReport,
        ledger_total: usize,
    ) -> Self {
        Self {
            gallery_url: gallery_url.to_string(),
            started_utc,
            finished_utc,
            end_reason: report.end_reason.map(|reason| reason.to_string()),
            discovered: report.discovered,
            downloaded: report.downloaded,
            skipped_already_present: report.skipped_already_present,
            already_absent: report.already_absent,
            malformed: report.malformed,
            permanent_failures: report.permanent_failures,
            ledger_total,
        }
    }
}

pub fn load_summary(output_dir: &Path) -> Option<RunSummary> {
    let path = output_dir.join(SUMMARY_FILENAME);
    let content = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
        Err(err) => {
            harvest_warn!("Failed to read last run summary {:?}: {}", path, err);
            return None;
        }
    };
    match ron::from_str(&content) {
        Ok(summary) => Some(summary),
        Err(err) => {
            harvest_warn!("Failed to parse last run summary {:?}: {}", path, err);
            None
        }
    }
}

pub fn save_summary(output_dir: &Path, summary: &RunSummary) {
    let content = match ron::ser::to_string_pretty(summary, ron::ser::PrettyConfig::new()) {
        Ok(text) => text,
        Err(err) => {
            harvest_error!("Failed to serialize run summary: {}", err);
            return;
        }
    };
    let writer = AtomicFileWriter::new(output_dir.to_path_buf());
    if let Err(err) = writer.write(SUMMARY_FILENAME, content.as_bytes()) {
        harvest_error!("Failed to write run summary to {:?}: {}", output_dir, err);
    }
}
