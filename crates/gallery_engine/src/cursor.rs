use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use gallery_core::{ItemReference, SessionConfig};
use gallery_logging::{harvest_debug, harvest_info, harvest_warn};
use rand::Rng;

use crate::context::{ContextError, PrimaryHandle, ViewingContextProvider};
use crate::markup::CompiledMarkup;

#[derive(Debug, Clone)]
struct ScrollSettings {
    max_attempts: u32,
    fraction: f64,
    steps: u32,
    step_pause: Duration,
    settle: (Duration, Duration),
    max_stale: u32,
}

/// Sole owner of the primary context. It only ever reads and scrolls it.
pub struct GalleryCursor {
    provider: Arc<dyn ViewingContextProvider>,
    primary: PrimaryHandle,
    markup: Arc<CompiledMarkup>,
    settings: ScrollSettings,
    attempts: u32,
    stale_advances: u32,
    known: HashSet<ItemReference>,
}

impl GalleryCursor {
    pub fn new(
        provider: Arc<dyn ViewingContextProvider>,
        primary: PrimaryHandle,
        markup: Arc<CompiledMarkup>,
        config: &SessionConfig,
    ) -> Self {
        Self {
            provider,
            primary,
            markup,
            settings: ScrollSettings {
                max_attempts: config.max_scroll_attempts,
                fraction: config.scroll_increment_fraction,
                steps: config.scroll_steps,
                step_pause: config.scroll_step_pause(),
                settle: config.settle_bounds(),
                max_stale: config.max_stale_advances,
            },
            attempts: 0,
            stale_advances: 0,
            known: HashSet::new(),
        }
    }

    /// Every item reference currently rendered, top to bottom. A read that
    /// fails twice without losing the context yields nothing this round.
    pub async fn discover(&mut self) -> Result<Vec<ItemReference>, ContextError> {
        let references = retry_once("read", || self.rendered_references())
            .await?
            .unwrap_or_default();
        self.known.extend(references.iter().cloned());
        Ok(references)
    }

    /// Scrolls one increment and lets the page settle. Returns `false` once
    /// the scroll budget is spent or nothing new has appeared for
    /// `max_stale_advances` consecutive advances. An increment that fails
    /// twice without losing the context counts as one that found nothing.
    pub async fn advance(&mut self) -> Result<bool, ContextError> {
        self.attempts += 1;
        if self.attempts >= self.settings.max_attempts {
            harvest_info!(
                "Scroll budget of {} attempts reached",
                self.settings.max_attempts
            );
            return Ok(false);
        }

        let references = retry_once("scroll", || self.scroll_increment())
            .await?
            .unwrap_or_default();
        let before = self.known.len();
        self.known.extend(references);
        let fresh = self.known.len() - before;

        if fresh == 0 {
            self.stale_advances += 1;
            harvest_debug!(
                "Advance {} found nothing new ({}/{})",
                self.attempts,
                self.stale_advances,
                self.settings.max_stale
            );
            if self.stale_advances >= self.settings.max_stale {
                harvest_info!("Gallery exhausted after {} advances", self.attempts);
                return Ok(false);
            }
        } else {
            self.stale_advances = 0;
            harvest_debug!("Advance {} revealed {} new item(s)", self.attempts, fresh);
        }
        Ok(true)
    }

    pub async fn position(&self) -> Result<f64, ContextError> {
        self.provider.scroll_position(&self.primary).await
    }

    /// Advances attempted so far, including the one that hit the budget.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    async fn scroll_increment(&self) -> Result<Vec<ItemReference>, ContextError> {
        for _ in 0..self.settings.steps {
            self.provider
                .scroll_by(&self.primary, self.settings.fraction)
                .await?;
            tokio::time::sleep(self.settings.step_pause).await;
        }
        tokio::time::sleep(self.settle_interval()).await;
        self.rendered_references().await
    }

    async fn rendered_references(&self) -> Result<Vec<ItemReference>, ContextError> {
        let content = self.provider.primary_content(&self.primary).await?;
        Ok(self.markup.item_references(&content.html, &content.url))
    }

    fn settle_interval(&self) -> Duration {
        let (min, max) = self.settings.settle;
        if max <= min {
            return min;
        }
        let secs = rand::thread_rng().gen_range(min.as_secs_f64()..=max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

/// Runs `op` up to twice. `Lost` is passed straight through; any other
/// failure on both tries gives `Ok(None)`.
async fn retry_once<T, F, Fut>(what: &str, op: F) -> Result<Option<T>, ContextError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ContextError>>,
{
    for attempt in 1..=2 {
        match op().await {
            Ok(value) => return Ok(Some(value)),
            Err(err) if err.is_lost() => return Err(err),
            Err(err) => harvest_warn!("Gallery {} failed (try {}/2): {}", what, attempt, err),
        }
    }
    Ok(None)
}
