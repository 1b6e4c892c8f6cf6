use std::fs;
use std::path::{Path, PathBuf};

use gallery_core::ItemIdentity;
use url::Url;

use crate::persist::{AtomicFileWriter, PersistError};
use crate::types::{FetchedResource, StoredMedia};

const KNOWN_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
const DEFAULT_EXTENSION: &str = "jpg";

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Byte sink keyed by identity. Writing the same identity twice is safe.
pub trait MediaSink: Send + Sync {
    fn write(
        &self,
        identity: &ItemIdentity,
        resource: &FetchedResource,
    ) -> Result<StoredMedia, SinkError>;
}

/// Stores each item as `{dir}/{identity}.{ext}` via an atomic rename.
#[derive(Debug, Clone)]
pub struct FileSink {
    writer: AtomicFileWriter,
}

impl FileSink {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir),
        }
    }

    pub fn dir(&self) -> &Path {
        self.writer.dir()
    }

    /// Identities of media files already in the directory. Hidden files
    /// (the ledger, in-progress temp files) are ignored.
    pub fn stored_identities(&self) -> Result<Vec<ItemIdentity>, SinkError> {
        if !self.dir().exists() {
            return Ok(Vec::new());
        }
        let mut identities: Vec<ItemIdentity> = fs::read_dir(self.dir())?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
            .filter_map(|e| {
                let path = e.path();
                let name = path.file_name()?.to_str()?;
                if name.starts_with('.') {
                    return None;
                }
                ItemIdentity::parse(path.file_stem()?.to_str()?)
            })
            .collect();
        identities.sort();
        identities.dedup();
        Ok(identities)
    }
}

impl MediaSink for FileSink {
    fn write(
        &self,
        identity: &ItemIdentity,
        resource: &FetchedResource,
    ) -> Result<StoredMedia, SinkError> {
        let filename = format!("{}.{}", identity, extension_for(resource));
        let path = self.writer.write(&filename, &resource.bytes)?;
        Ok(StoredMedia {
            path,
            bytes_written: resource.len(),
        })
    }
}

/// Content type first, then the URL's own extension, then `jpg`.
pub fn extension_for(resource: &FetchedResource) -> &'static str {
    let from_content_type = resource.content_type.as_deref().and_then(|ct| {
        let essence = ct.split(';').next().unwrap_or(ct).trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
            "image/png" => Some("png"),
            "image/gif" => Some("gif"),
            "image/webp" => Some("webp"),
            _ => None,
        }
    });
    from_content_type
        .or_else(|| extension_from_url(&resource.final_url))
        .unwrap_or(DEFAULT_EXTENSION)
}

fn extension_from_url(url: &str) -> Option<&'static str> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    let (_, ext) = last.rsplit_once('.')?;
    KNOWN_EXTENSIONS
        .iter()
        .find(|known| known.eq_ignore_ascii_case(ext))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn resource(url: &str, content_type: Option<&str>) -> FetchedResource {
        FetchedResource {
            final_url: url.to_string(),
            content_type: content_type.map(str::to_string),
            bytes: Bytes::from_static(b"x"),
        }
    }

    #[test]
    fn content_type_wins_over_url() {
        let r = resource("https://cdn.example/a.png", Some("image/webp; q=1"));
        assert_eq!(extension_for(&r), "webp");
    }

    #[test]
    fn url_extension_is_used_when_content_type_is_generic() {
        let r = resource(
            "https://cdn.example/a.GIF?x=1",
            Some("application/octet-stream"),
        );
        assert_eq!(extension_for(&r), "gif");
    }

    #[test]
    fn unknown_everything_defaults_to_jpg() {
        let r = resource("https://cdn.example/blob", None);
        assert_eq!(extension_for(&r), "jpg");
    }
}
