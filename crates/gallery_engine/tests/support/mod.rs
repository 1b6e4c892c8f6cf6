#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use bytes::Bytes;
use gallery_core::{IdentityResolver, MarkupRules, SessionConfig};
use gallery_engine::{
    CompiledMarkup, ContextError, FailureKind, FetchError, FetchExecutor, FetchedResource,
    GalleryCursor, HarvestLoop, PrimaryHandle, RenderedContent, ResourceFetcher, SecondaryHandle,
    ViewingContextProvider,
};

pub const GALLERY_URL: &str = "https://gallery.test/someone/photos";
const VIEWPORT_HEIGHT: f64 = 1000.0;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(gallery_logging::initialize_for_tests);
}

pub fn item_url(id: &str) -> String {
    format!("https://gallery.test/someone/photos/{id}")
}

pub fn media_url(id: &str) -> String {
    format!("https://cdn.test/{id}_n.jpg")
}

/// Waits collapse to zero and every advance is a single scroll step.
pub fn fast_config() -> SessionConfig {
    SessionConfig {
        scroll_steps: 1,
        scroll_step_pause_secs: 0.0,
        settle_interval_range: (0.0, 0.0),
        resource_timeout_secs: 0.2,
        poll_interval_secs: 0.01,
        max_scroll_attempts: 50,
        ..SessionConfig::default()
    }
}

#[derive(Default)]
struct GalleryState {
    scroll_calls: u32,
    position: f64,
    next_tab: u32,
    /// Open tab key -> last navigated URL.
    open_tabs: HashMap<String, Option<String>>,
    max_open_tabs: usize,
    opened: u32,
    closed: u32,
    navigations: Vec<String>,
    /// Primary position when each tab was opened and when it was closed.
    positions_around_fetch: Vec<(f64, f64)>,
    open_positions: HashMap<String, f64>,
    /// Scroll calls still to be answered with a timeout.
    scroll_timeouts_left: u32,
}

/// A scripted infinite-scroll gallery. Items become visible in batches as the
/// primary context is scrolled; item pages render one large image.
pub struct FakeGallery {
    items: Vec<String>,
    initially_visible: usize,
    per_scroll: usize,
    never_resolves: HashSet<String>,
    hanging_navigations: HashSet<String>,
    fail_close: bool,
    lose_primary_after_scrolls: Option<u32>,
    state: Mutex<GalleryState>,
}

impl FakeGallery {
    pub fn new(ids: &[&str], initially_visible: usize, per_scroll: usize) -> Self {
        Self {
            items: ids.iter().map(|id| id.to_string()).collect(),
            initially_visible,
            per_scroll,
            never_resolves: HashSet::new(),
            hanging_navigations: HashSet::new(),
            fail_close: false,
            lose_primary_after_scrolls: None,
            state: Mutex::new(GalleryState::default()),
        }
    }

    pub fn with_numbered_items(count: usize, initially_visible: usize, per_scroll: usize) -> Self {
        let ids: Vec<String> = (1..=count).map(|n| format!("{}", 1000 + n)).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        Self::new(&refs, initially_visible, per_scroll)
    }

    pub fn never_resolving(mut self, id: &str) -> Self {
        self.never_resolves.insert(id.to_string());
        self
    }

    /// Navigating a tab to this item never completes.
    pub fn hanging_navigation(mut self, id: &str) -> Self {
        self.hanging_navigations.insert(id.to_string());
        self
    }

    pub fn failing_teardown(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn losing_primary_after(mut self, scrolls: u32) -> Self {
        self.lose_primary_after_scrolls = Some(scrolls);
        self
    }

    /// The next `count` scroll calls time out without moving the gallery.
    pub fn timing_out_scrolls(self, count: u32) -> Self {
        self.state.lock().unwrap().scroll_timeouts_left = count;
        self
    }

    pub fn scroll_calls(&self) -> u32 {
        self.state.lock().unwrap().scroll_calls
    }

    pub fn opened(&self) -> u32 {
        self.state.lock().unwrap().opened
    }

    pub fn closed(&self) -> u32 {
        self.state.lock().unwrap().closed
    }

    pub fn open_tabs(&self) -> usize {
        self.state.lock().unwrap().open_tabs.len()
    }

    pub fn max_open_tabs(&self) -> usize {
        self.state.lock().unwrap().max_open_tabs
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    pub fn positions_around_fetch(&self) -> Vec<(f64, f64)> {
        self.state.lock().unwrap().positions_around_fetch.clone()
    }

    fn visible(&self, scroll_calls: u32) -> &[String] {
        let count = self.initially_visible + self.per_scroll * scroll_calls as usize;
        &self.items[..count.min(self.items.len())]
    }

    fn item_page(&self, url: &str) -> String {
        let id = url.rsplit('/').next().unwrap_or_default();
        if self.never_resolves.contains(id) {
            return "<html><body><div role=\"dialog\">loading</div></body></html>".to_string();
        }
        format!(
            r#"<html><body><div role="dialog">
                <img src="https://cdn.test/avatar.jpg" width="40" height="40">
                <img data-visualcompletion="media-vc-image" src="{}" width="960" height="720">
            </div></body></html>"#,
            media_url(id)
        )
    }
}

#[async_trait]
impl ViewingContextProvider for FakeGallery {
    async fn open_secondary(&self) -> Result<SecondaryHandle, ContextError> {
        let mut state = self.state.lock().unwrap();
        state.next_tab += 1;
        state.opened += 1;
        let key = format!("tab-{}", state.next_tab);
        state.open_tabs.insert(key.clone(), None);
        state.max_open_tabs = state.max_open_tabs.max(state.open_tabs.len());
        let position = state.position;
        state.open_positions.insert(key.clone(), position);
        Ok(SecondaryHandle::new(key))
    }

    async fn close_secondary(&self, handle: SecondaryHandle) -> Result<(), ContextError> {
        let mut state = self.state.lock().unwrap();
        state.open_tabs.remove(handle.key());
        state.closed += 1;
        let opened_at = state.open_positions.remove(handle.key()).unwrap_or(f64::NAN);
        let position = state.position;
        state.positions_around_fetch.push((opened_at, position));
        if self.fail_close {
            return Err(ContextError::Command("tab refused to close".to_string()));
        }
        Ok(())
    }

    async fn navigate(&self, handle: &SecondaryHandle, url: &str) -> Result<(), ContextError> {
        let id = url.rsplit('/').next().unwrap_or_default();
        if self.hanging_navigations.contains(id) {
            std::future::pending::<()>().await;
        }
        let mut state = self.state.lock().unwrap();
        let tab = state
            .open_tabs
            .get_mut(handle.key())
            .ok_or_else(|| ContextError::Lost(handle.key().to_string()))?;
        *tab = Some(url.to_string());
        state.navigations.push(url.to_string());
        Ok(())
    }

    async fn secondary_content(
        &self,
        handle: &SecondaryHandle,
    ) -> Result<RenderedContent, ContextError> {
        let url = {
            let state = self.state.lock().unwrap();
            state
                .open_tabs
                .get(handle.key())
                .cloned()
                .flatten()
                .ok_or_else(|| ContextError::Lost(handle.key().to_string()))?
        };
        Ok(RenderedContent {
            html: self.item_page(&url),
            url,
        })
    }

    async fn primary_content(
        &self,
        _handle: &PrimaryHandle,
    ) -> Result<RenderedContent, ContextError> {
        let scroll_calls = self.state.lock().unwrap().scroll_calls;
        if self
            .lose_primary_after_scrolls
            .is_some_and(|limit| scroll_calls >= limit)
        {
            return Err(ContextError::Lost("gallery window closed".to_string()));
        }
        let mut html = String::from("<html><body><div role=\"main\">");
        html.push_str("<a href=\"/someone/photos/a.998877/\">Album</a>");
        for id in self.visible(scroll_calls) {
            html.push_str(&format!(
                "<a href=\"/someone/photos/{id}\"><img src=\"https://cdn.test/{id}_s.jpg\"></a>"
            ));
        }
        html.push_str("</div></body></html>");
        Ok(RenderedContent {
            url: GALLERY_URL.to_string(),
            html,
        })
    }

    async fn scroll_by(&self, _handle: &PrimaryHandle, fraction: f64) -> Result<(), ContextError> {
        let mut state = self.state.lock().unwrap();
        if state.scroll_timeouts_left > 0 {
            state.scroll_timeouts_left -= 1;
            return Err(ContextError::Timeout("script timeout".to_string()));
        }
        state.scroll_calls += 1;
        state.position += (VIEWPORT_HEIGHT * fraction).floor();
        Ok(())
    }

    async fn scroll_position(&self, _handle: &PrimaryHandle) -> Result<f64, ContextError> {
        Ok(self.state.lock().unwrap().position)
    }
}

/// Serves every media URL with a small JPEG-sized body unless told otherwise.
#[derive(Default)]
pub struct FakeFetcher {
    failures: HashMap<String, FailureKind>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, id: &str, kind: FailureKind) -> Self {
        self.failures.insert(media_url(id), kind);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceFetcher for FakeFetcher {
    async fn download(&self, url: &str) -> Result<FetchedResource, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(kind) = self.failures.get(url) {
            return Err(FetchError::new(kind.clone(), "scripted failure"));
        }
        Ok(FetchedResource {
            final_url: url.to_string(),
            content_type: Some("image/jpeg".to_string()),
            bytes: Bytes::from(vec![0xFF; 2048]),
        })
    }
}

pub fn markup() -> Arc<CompiledMarkup> {
    Arc::new(CompiledMarkup::new(&MarkupRules::default()).unwrap())
}

pub fn cursor(gallery: Arc<FakeGallery>, config: &SessionConfig) -> GalleryCursor {
    GalleryCursor::new(gallery, PrimaryHandle::new("primary"), markup(), config)
}

pub fn harvest_loop(
    gallery: Arc<FakeGallery>,
    fetcher: Arc<FakeFetcher>,
    config: &SessionConfig,
) -> HarvestLoop {
    let markup = markup();
    let cursor = GalleryCursor::new(
        gallery.clone(),
        PrimaryHandle::new("primary"),
        markup.clone(),
        config,
    );
    let executor = FetchExecutor::new(gallery, fetcher, markup, config);
    HarvestLoop::new(cursor, executor, IdentityResolver::default(), config.limits())
}
