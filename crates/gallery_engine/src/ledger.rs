//! Durable record of fully downloaded identities.
//!
//! One entry per line: `<identity> <checksum>\n`, where the checksum is the
//! first eight hex digits of SHA-256 over the identity. Anything that does not
//! parse back exactly (bad checksum, stray bytes, a final line without its
//! newline) is treated as absent, so the item is fetched again.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use gallery_core::ItemIdentity;
use gallery_logging::{harvest_debug, harvest_info, harvest_warn};
use sha2::{Digest, Sha256};

use crate::persist::{ensure_output_dir, PersistError};
use crate::sink::{FileSink, SinkError};

pub const LEDGER_FILENAME: &str = ".harvest_ledger";

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("scanning stored media: {0}")]
    Scan(#[from] SinkError),
}

/// The set of identities whose content is known to be in the sink.
pub trait Ledger: Send {
    fn contains(&self, identity: &ItemIdentity) -> bool;

    /// Adds `identity`; returns `false` when it was already present.
    /// Must be durable before returning `Ok`.
    fn record(&mut self, identity: &ItemIdentity) -> Result<bool, LedgerError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
pub struct FileLedger {
    path: PathBuf,
    entries: HashSet<ItemIdentity>,
    file: Option<File>,
    /// The file does not end in `\n`; the next append must terminate that line first.
    needs_newline: bool,
    rejected_lines: usize,
}

impl FileLedger {
    /// Loads every valid entry. A missing file yields an empty ledger.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        Self::open(path, true)
    }

    /// Starts with an empty in-memory set but appends to the same file, so a
    /// later resumed run still sees what this run records.
    pub fn fresh(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        Self::open(path, false)
    }

    pub fn open(path: impl Into<PathBuf>, preload: bool) -> Result<Self, LedgerError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_output_dir(parent)?;
        }

        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(source) => return Err(LedgerError::Io { path, source }),
        };

        let needs_newline = raw.last().is_some_and(|last| *last != b'\n');
        let (entries, rejected_lines) = parse_entries(&raw);
        if rejected_lines > 0 {
            harvest_warn!(
                "Ignored {} unreadable ledger line(s) in {:?}",
                rejected_lines,
                path
            );
        }

        let entries = if preload {
            harvest_info!("Loaded {} ledger entries from {:?}", entries.len(), path);
            entries
        } else {
            HashSet::new()
        };

        Ok(Self {
            path,
            entries,
            file: None,
            needs_newline,
            rejected_lines,
        })
    }

    /// Opens `LEDGER_FILENAME` in the sink's directory. On resume the file is
    /// loaded and media already stored there is adopted; otherwise the run
    /// starts from an empty set.
    pub fn for_sink(sink: &FileSink, resume: bool) -> Result<Self, LedgerError> {
        let path = sink.dir().join(LEDGER_FILENAME);
        if !resume {
            return Self::fresh(path);
        }
        let mut ledger = Self::load(path)?;
        let adopted = ledger.adopt(sink.stored_identities()?)?;
        if adopted > 0 {
            harvest_info!("Adopted {} file(s) already in {:?}", adopted, sink.dir());
        }
        Ok(ledger)
    }

    /// Records each identity not yet present; returns how many were new.
    pub fn adopt(
        &mut self,
        identities: impl IntoIterator<Item = ItemIdentity>,
    ) -> Result<usize, LedgerError> {
        let mut adopted = 0;
        for identity in identities {
            if self.record(&identity)? {
                adopted += 1;
            }
        }
        Ok(adopted)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines found on disk that did not parse back into an identity.
    pub fn rejected_lines(&self) -> usize {
        self.rejected_lines
    }

    fn append(&mut self, identity: &ItemIdentity) -> io::Result<()> {
        // A handle that failed a write is dropped and reopened on the next append.
        let mut file = match self.file.take() {
            Some(file) => file,
            None => OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?,
        };

        let mut line = String::new();
        if self.needs_newline {
            line.push('\n');
        }
        line.push_str(&format_entry(identity));

        // Until the write is confirmed, assume a torn line may be on disk.
        self.needs_newline = true;
        file.write_all(line.as_bytes())?;
        file.sync_data()?;
        self.needs_newline = false;
        self.file = Some(file);
        Ok(())
    }
}

impl Ledger for FileLedger {
    fn contains(&self, identity: &ItemIdentity) -> bool {
        self.entries.contains(identity)
    }

    fn record(&mut self, identity: &ItemIdentity) -> Result<bool, LedgerError> {
        if self.entries.contains(identity) {
            return Ok(false);
        }
        self.append(identity).map_err(|source| LedgerError::Io {
            path: self.path.clone(),
            source,
        })?;
        harvest_debug!("Recorded {} in ledger", identity);
        self.entries.insert(identity.clone());
        Ok(true)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

fn format_entry(identity: &ItemIdentity) -> String {
    format!("{} {}\n", identity, checksum(identity.as_str()))
}

fn parse_entries(raw: &[u8]) -> (HashSet<ItemIdentity>, usize) {
    let mut entries = HashSet::new();
    let mut rejected = 0;

    let mut lines: Vec<&[u8]> = raw.split(|b| *b == b'\n').collect();
    // The piece after the last newline is either empty or a torn write.
    if let Some(tail) = lines.pop() {
        if !tail.is_empty() {
            rejected += 1;
        }
    }

    for line in lines {
        if line.is_empty() {
            continue;
        }
        match parse_line(line) {
            Some(identity) => {
                entries.insert(identity);
            }
            None => rejected += 1,
        }
    }
    (entries, rejected)
}

fn parse_line(line: &[u8]) -> Option<ItemIdentity> {
    let text = std::str::from_utf8(line).ok()?;
    let (identity, sum) = text.split_once(' ')?;
    if sum != checksum(identity) {
        return None;
    }
    ItemIdentity::parse(identity)
}

fn checksum(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_round_trips_through_parse_line() {
        let identity = ItemIdentity::parse("10155").unwrap();
        let entry = format_entry(&identity);
        assert!(entry.ends_with('\n'));
        let line = entry.trim_end_matches('\n').as_bytes();
        assert_eq!(parse_line(line), Some(identity));
    }

    #[test]
    fn flipped_checksum_is_rejected() {
        let identity = ItemIdentity::parse("10155").unwrap();
        let entry = format_entry(&identity).replace("10155 ", "10156 ");
        let (entries, rejected) = parse_entries(entry.as_bytes());
        assert!(entries.is_empty());
        assert_eq!(rejected, 1);
    }
}
