use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use gallery_core::{PendingItem, SessionConfig};
use gallery_logging::{harvest_debug, harvest_warn};
use url::Url;

use crate::context::{SecondaryHandle, ViewingContextProvider};
use crate::download::ResourceFetcher;
use crate::markup::{CompiledMarkup, MediaResolution};
use crate::sink::MediaSink;
use crate::types::{FailureKind, FetchError, FetchOutcome, FetchReport, StoredMedia};

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Fetches one item in a disposable secondary context.
pub struct FetchExecutor {
    provider: Arc<dyn ViewingContextProvider>,
    fetcher: Arc<dyn ResourceFetcher>,
    markup: Arc<CompiledMarkup>,
    resource_timeout: Duration,
    poll_interval: Duration,
    min_media_pixels: u64,
}

impl FetchExecutor {
    pub fn new(
        provider: Arc<dyn ViewingContextProvider>,
        fetcher: Arc<dyn ResourceFetcher>,
        markup: Arc<CompiledMarkup>,
        config: &SessionConfig,
    ) -> Self {
        Self {
            provider,
            fetcher,
            markup,
            resource_timeout: config.resource_timeout(),
            poll_interval: config.poll_interval().max(MIN_POLL_INTERVAL),
            min_media_pixels: config.min_media_pixels,
        }
    }

    /// The secondary context is closed on every path out of this function,
    /// including a panic inside the work, which is re-raised after teardown.
    pub async fn fetch(&self, item: &PendingItem, sink: &dyn MediaSink) -> FetchReport {
        let handle = match self.provider.open_secondary().await {
            Ok(handle) => handle,
            Err(err) => {
                return FetchReport {
                    outcome: FetchOutcome::TransientFailure(FetchError::new(
                        FailureKind::Context,
                        err.to_string(),
                    )),
                    teardown_error: None,
                }
            }
        };

        let work = AssertUnwindSafe(self.fetch_in(&handle, item, sink))
            .catch_unwind()
            .await;

        let key = handle.key().to_string();
        let teardown_error = match self.provider.close_secondary(handle).await {
            Ok(()) => None,
            Err(err) => {
                harvest_warn!("Failed to close secondary context {}: {}", key, err);
                Some(err)
            }
        };

        match work {
            Ok(result) => FetchReport {
                outcome: result.into(),
                teardown_error,
            },
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn fetch_in(
        &self,
        handle: &SecondaryHandle,
        item: &PendingItem,
        sink: &dyn MediaSink,
    ) -> Result<StoredMedia, FetchError> {
        let navigation = self.provider.navigate(handle, item.reference.as_str());
        tokio::time::timeout(self.resource_timeout, navigation)
            .await
            .map_err(|_| {
                FetchError::new(
                    FailureKind::Navigation,
                    format!("page not loaded after {:?}", self.resource_timeout),
                )
            })?
            .map_err(|err| FetchError::new(FailureKind::Navigation, err.to_string()))?;

        let media_url = tokio::time::timeout(self.resource_timeout, self.poll_media(handle))
            .await
            .map_err(|_| {
                FetchError::new(
                    FailureKind::ResolveTimeout,
                    format!("no media after {:?}", self.resource_timeout),
                )
            })??;
        harvest_debug!("{} resolved to {}", item.identity, media_url);

        let resource = self.fetcher.download(media_url.as_str()).await?;
        sink.write(&item.identity, &resource)
            .map_err(|err| FetchError::new(FailureKind::Sink, err.to_string()))
    }

    async fn poll_media(&self, handle: &SecondaryHandle) -> Result<Url, FetchError> {
        loop {
            let content = self
                .provider
                .secondary_content(handle)
                .await
                .map_err(|err| FetchError::new(FailureKind::Context, err.to_string()))?;
            match self
                .markup
                .resolve_media(&content.html, &content.url, self.min_media_pixels)
            {
                MediaResolution::Resolved(url) => return Ok(url),
                MediaResolution::Malformed(reason) => {
                    return Err(FetchError::new(FailureKind::MalformedMarkup, reason))
                }
                MediaResolution::Pending => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }
}
