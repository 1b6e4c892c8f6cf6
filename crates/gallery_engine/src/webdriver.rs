//! [`ViewingContextProvider`] over a WebDriver session.
//!
//! The initial browser window is the primary context; every secondary context
//! is a fresh tab. WebDriver commands act on the focused window, so each
//! "switch window + command" pair runs under one async lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use fantoccini::error::{CmdError, ErrorStatus};
use fantoccini::wd::WindowHandle;
use fantoccini::{Client, ClientBuilder};
use gallery_logging::{harvest_debug, harvest_info};
use serde_json::json;
use tokio::sync::Mutex;

use crate::context::{
    ContextError, PrimaryHandle, RenderedContent, SecondaryHandle, ViewingContextProvider,
};
use crate::markup::{RENDERED_HEIGHT, RENDERED_WIDTH};

const PRIMARY_KEY: &str = "primary";
const SCROLL_SCRIPT: &str = "window.scrollBy(0, Math.floor(window.innerHeight * arguments[0]));";
const POSITION_SCRIPT: &str =
    "return window.pageYOffset || document.documentElement.scrollTop || 0;";

pub struct WebDriverProvider {
    client: Client,
    primary: WindowHandle,
    /// Held for every command; also guards the open tabs.
    focus: Mutex<HashMap<String, WindowHandle>>,
    next_key: AtomicU64,
    primary_claimed: AtomicBool,
}

impl WebDriverProvider {
    /// Starts a Chrome session through the WebDriver server at `webdriver_url`.
    pub async fn connect(webdriver_url: &str, headless: bool) -> Result<Self, ContextError> {
        let mut args = vec!["--disable-notifications", "--window-size=1400,1000"];
        if headless {
            args.push("--headless=new");
        }
        let mut capabilities = serde_json::Map::new();
        capabilities.insert("goog:chromeOptions".to_string(), json!({ "args": args }));

        let client = ClientBuilder::rustls()
            .map_err(|err| ContextError::Command(err.to_string()))?
            .capabilities(capabilities)
            .connect(webdriver_url)
            .await
            .map_err(|err| ContextError::Lost(format!("webdriver session: {err}")))?;
        let primary = client.window().await.map_err(map_cmd_error)?;
        harvest_info!("Connected to WebDriver at {}", webdriver_url);

        Ok(Self {
            client,
            primary,
            focus: Mutex::new(HashMap::new()),
            next_key: AtomicU64::new(1),
            primary_claimed: AtomicBool::new(false),
        })
    }

    /// Loads the gallery into the primary window and hands out its one handle.
    /// This is the only navigation the primary window ever sees.
    pub async fn open_gallery(&self, url: &str) -> Result<PrimaryHandle, ContextError> {
        if self.primary_claimed.swap(true, Ordering::SeqCst) {
            return Err(ContextError::Command(
                "gallery context already opened".to_string(),
            ));
        }
        let _focus = self.focus.lock().await;
        self.focus_primary().await?;
        self.client.goto(url).await.map_err(map_cmd_error)?;
        harvest_info!("Opened gallery {}", url);
        Ok(PrimaryHandle::new(PRIMARY_KEY))
    }

    pub async fn shutdown(self) -> Result<(), ContextError> {
        self.client.close().await.map_err(map_cmd_error)
    }

    async fn focus_primary(&self) -> Result<(), ContextError> {
        self.client
            .switch_to_window(self.primary.clone())
            .await
            .map_err(map_cmd_error)
    }

    async fn focus_secondary(
        &self,
        tabs: &HashMap<String, WindowHandle>,
        handle: &SecondaryHandle,
    ) -> Result<(), ContextError> {
        let window = tabs
            .get(handle.key())
            .cloned()
            .ok_or_else(|| ContextError::Lost(format!("unknown context {}", handle.key())))?;
        self.client
            .switch_to_window(window)
            .await
            .map_err(map_cmd_error)
    }

    async fn rendered(&self) -> Result<RenderedContent, ContextError> {
        let html = self.client.source().await.map_err(map_cmd_error)?;
        let url = self.client.current_url().await.map_err(map_cmd_error)?;
        Ok(RenderedContent {
            url: url.to_string(),
            html,
        })
    }
}

#[async_trait]
impl ViewingContextProvider for WebDriverProvider {
    async fn open_secondary(&self) -> Result<SecondaryHandle, ContextError> {
        let mut tabs = self.focus.lock().await;
        let window = self.client.new_window(true).await.map_err(map_cmd_error)?;
        let key = format!("tab-{}", self.next_key.fetch_add(1, Ordering::Relaxed));
        tabs.insert(key.clone(), window.handle);
        harvest_debug!("Opened {}", key);
        Ok(SecondaryHandle::new(key))
    }

    async fn close_secondary(&self, handle: SecondaryHandle) -> Result<(), ContextError> {
        let mut tabs = self.focus.lock().await;
        let closed = match tabs.remove(handle.key()) {
            Some(window) => match self.client.switch_to_window(window).await {
                Ok(()) => self.client.close_window().await.map_err(map_cmd_error),
                Err(err) => Err(map_cmd_error(err)),
            },
            None => Err(ContextError::Lost(format!(
                "unknown context {}",
                handle.key()
            ))),
        };
        // Focus goes back to the gallery even when the tab would not close.
        let refocused = self.focus_primary().await;
        closed?;
        refocused
    }

    async fn navigate(&self, handle: &SecondaryHandle, url: &str) -> Result<(), ContextError> {
        let tabs = self.focus.lock().await;
        self.focus_secondary(&tabs, handle).await?;
        self.client.goto(url).await.map_err(map_cmd_error)
    }

    async fn secondary_content(
        &self,
        handle: &SecondaryHandle,
    ) -> Result<RenderedContent, ContextError> {
        let tabs = self.focus.lock().await;
        self.focus_secondary(&tabs, handle).await?;
        let annotate = format!(
            "document.querySelectorAll('img').forEach(function (img) {{ \
             img.setAttribute('{RENDERED_WIDTH}', img.naturalWidth); \
             img.setAttribute('{RENDERED_HEIGHT}', img.naturalHeight); }});"
        );
        self.client
            .execute(&annotate, Vec::new())
            .await
            .map_err(map_cmd_error)?;
        self.rendered().await
    }

    async fn primary_content(
        &self,
        _handle: &PrimaryHandle,
    ) -> Result<RenderedContent, ContextError> {
        let _focus = self.focus.lock().await;
        self.focus_primary().await?;
        self.rendered().await
    }

    async fn scroll_by(&self, _handle: &PrimaryHandle, fraction: f64) -> Result<(), ContextError> {
        let _focus = self.focus.lock().await;
        self.focus_primary().await?;
        self.client
            .execute(SCROLL_SCRIPT, vec![json!(fraction)])
            .await
            .map_err(map_cmd_error)?;
        Ok(())
    }

    async fn scroll_position(&self, _handle: &PrimaryHandle) -> Result<f64, ContextError> {
        let _focus = self.focus.lock().await;
        self.focus_primary().await?;
        let value = self
            .client
            .execute(POSITION_SCRIPT, Vec::new())
            .await
            .map_err(map_cmd_error)?;
        Ok(value.as_f64().unwrap_or_default())
    }
}

fn map_cmd_error(err: CmdError) -> ContextError {
    match &err {
        CmdError::Lost(_) => ContextError::Lost(err.to_string()),
        CmdError::Standard(wd)
            if matches!(
                wd.error,
                ErrorStatus::NoSuchWindow | ErrorStatus::InvalidSessionId
            ) =>
        {
            ContextError::Lost(err.to_string())
        }
        CmdError::Standard(wd) if wd.error == ErrorStatus::Timeout => {
            ContextError::Timeout(err.to_string())
        }
        _ => ContextError::Command(err.to_string()),
    }
}
