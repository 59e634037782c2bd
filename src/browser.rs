use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::browser::{Browser as CrBrowser, BrowserConfig as CrBrowserConfig};
use chromiumoxide::handler::viewport::Viewport;
use futures::StreamExt;
use tracing::{debug, info};

use crate::config::{AutofillConfig, BrowserBuilder, BrowserConfig};
use crate::error::{Error, Result};
use crate::orchestrator::{AutofillOrchestrator, AutofillSession};
use crate::page::Page;
use crate::storage::StorageBackend;
use crate::store::CredentialStore;

/// Chrome flags that improve performance without affecting functionality.
const PERF_ARGS: &[&str] = &[
    "disable-gpu",
    "disable-extensions",
    "metrics-recording-only",
    "mute-audio",
    "no-default-browser-check",
    "disable-client-side-phishing-detection",
    "disable-popup-blocking",
    "disable-prompt-on-repost",
];

/// Chrome's built-in autofill stays local.
const AUTOFILL_ARGS: &[&str] = &["disable-features=AutofillServerCommunication"];

/// A Chrome instance whose pages the fill engine drives.
pub struct AutofillBrowser {
    browser: CrBrowser,
    load_timeout: Duration,
    autofill: AutofillConfig,
    handler_task: tokio::task::JoinHandle<()>,
}

fn chrome_config(config: &BrowserConfig) -> Result<CrBrowserConfig> {
    let mut builder = CrBrowserConfig::builder();
    builder = if config.headless {
        builder.new_headless_mode().no_sandbox()
    } else {
        builder.with_head().no_sandbox()
    };

    for arg in PERF_ARGS.iter().chain(AUTOFILL_ARGS) {
        builder = builder.arg(*arg);
    }
    for arg in &config.extra_args {
        builder = builder.arg(arg.as_str());
    }
    if let Some(path) = &config.chrome_path {
        builder = builder.chrome_executable(path);
    }

    builder
        .viewport(Viewport {
            width: config.viewport_width,
            height: config.viewport_height,
            device_scale_factor: None,
            emulating_mobile: false,
            is_landscape: false,
            has_touch: false,
        })
        .build()
        .map_err(Error::LaunchError)
}

impl AutofillBrowser {
    pub fn builder() -> BrowserBuilder {
        BrowserBuilder::new()
    }

    pub async fn launch(config: BrowserConfig) -> Result<Self> {
        let (browser, mut handler) = CrBrowser::launch(chrome_config(&config)?)
            .await
            .map_err(|e| Error::LaunchError(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler error");
                }
            }
        });
        info!(headless = config.headless, "browser launched");

        Ok(Self {
            browser,
            load_timeout: config.load_timeout,
            autofill: config.autofill,
            handler_task,
        })
    }

    /// Open a new tab at `url`.
    pub async fn new_page(&self, url: &str) -> Result<Page> {
        let cr_page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?;

        Ok(Page::new(cr_page, self.load_timeout))
    }

    /// Open `url` and start the automatic fill flow on it with the browser's
    /// autofill settings. The flow runs in the background; the session gives
    /// access to the page and can wait for or stop the flow.
    pub async fn autofill<B>(
        &self,
        url: &str,
        store: Arc<CredentialStore<B>>,
    ) -> Result<AutofillSession<Page>>
    where
        B: StorageBackend + 'static,
    {
        let page = Arc::new(self.new_page(url).await?);
        let orchestrator = AutofillOrchestrator::new(store, page.clone(), self.autofill.clone());
        info!(url, "autofill started");
        Ok(orchestrator.spawn(page))
    }

    /// Close Chrome and wait for the CDP handler to stop.
    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await?;
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        Ok(())
    }
}
