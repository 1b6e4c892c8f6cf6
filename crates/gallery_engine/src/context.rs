//! The capability set the harvest needs from a browser.
//!
//! There are two kinds of viewing context. The primary one renders the gallery
//! and holds its scroll position; nothing in this trait can navigate or reload
//! it. Secondary contexts are opened per fetch, may be navigated freely and are
//! closed by handing their handle back.

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("viewing context lost: {0}")]
    Lost(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("browser command failed: {0}")]
    Command(String),
}

impl ContextError {
    /// The context is gone for good; timeouts and failed commands may pass.
    pub fn is_lost(&self) -> bool {
        matches!(self, ContextError::Lost(_))
    }
}

/// Markup of a context as currently rendered, with the address it was rendered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedContent {
    pub url: String,
    pub html: String,
}

/// The one handle to the gallery context. Deliberately not `Clone`.
#[derive(Debug)]
pub struct PrimaryHandle {
    key: String,
}

impl PrimaryHandle {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Handle to a disposable context; consumed by [`ViewingContextProvider::close_secondary`].
#[derive(Debug)]
pub struct SecondaryHandle {
    key: String,
}

impl SecondaryHandle {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
pub trait ViewingContextProvider: Send + Sync {
    async fn open_secondary(&self) -> Result<SecondaryHandle, ContextError>;

    /// Closes the context and returns focus to the primary context.
    async fn close_secondary(&self, handle: SecondaryHandle) -> Result<(), ContextError>;

    async fn navigate(&self, handle: &SecondaryHandle, url: &str) -> Result<(), ContextError>;

    async fn secondary_content(
        &self,
        handle: &SecondaryHandle,
    ) -> Result<RenderedContent, ContextError>;

    async fn primary_content(&self, handle: &PrimaryHandle)
        -> Result<RenderedContent, ContextError>;

    /// Scrolls down by `fraction` of the viewport height.
    async fn scroll_by(&self, handle: &PrimaryHandle, fraction: f64) -> Result<(), ContextError>;

    async fn scroll_position(&self, handle: &PrimaryHandle) -> Result<f64, ContextError>;
}
