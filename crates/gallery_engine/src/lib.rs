//! Gallery engine: the IO half of the harvester.
//!
//! Owns the viewing contexts, downloads, the ledger and the output directory,
//! and runs the `gallery_core` state machine against them.
mod context;
mod cursor;
mod download;
mod executor;
mod harvest;
mod ledger;
mod markup;
mod persist;
mod sink;
mod types;
#[cfg(feature = "webdriver")]
mod webdriver;

pub use context::{
    ContextError, PrimaryHandle, RenderedContent, SecondaryHandle, ViewingContextProvider,
};
pub use cursor::GalleryCursor;
pub use download::{DownloadSettings, ReqwestFetcher, ResourceFetcher};
pub use executor::FetchExecutor;
pub use harvest::{HarvestError, HarvestEvent, HarvestLoop, LogProgressSink, ProgressSink};
pub use ledger::{FileLedger, Ledger, LedgerError, LEDGER_FILENAME};
pub use markup::{CompiledMarkup, MarkupError, MediaResolution, RENDERED_HEIGHT, RENDERED_WIDTH};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use sink::{extension_for, FileSink, MediaSink, SinkError};
pub use tokio_util::sync::CancellationToken;
pub use types::{
    FailureClass, FailureKind, FetchError, FetchOutcome, FetchReport, FetchedResource,
    StoredMedia,
};
#[cfg(feature = "webdriver")]
pub use webdriver::WebDriverProvider;
