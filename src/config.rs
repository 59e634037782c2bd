use std::time::Duration;

use crate::browser::AutofillBrowser;
use crate::error::Result;

/// Namespace key of the persisted snapshot.
pub const DEFAULT_STORAGE_KEY: &str = "password_fill_data";

/// How Chrome is launched, and how pages opened in it are auto-filled.
pub struct BrowserConfig {
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub chrome_path: Option<String>,
    /// Extra Chrome flags, without the leading `--`.
    pub extra_args: Vec<String>,
    /// Upper bound on waiting for a document to finish loading (default: 30s).
    pub load_timeout: Duration,
    pub autofill: AutofillConfig,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 800,
            chrome_path: None,
            extra_args: Vec::new(),
            load_timeout: Duration::from_secs(30),
            autofill: AutofillConfig::default(),
        }
    }
}

#[derive(Default)]
pub struct BrowserBuilder {
    config: BrowserConfig,
}

impl BrowserBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.viewport_width = width;
        self.config.viewport_height = height;
        self
    }

    pub fn chrome_path(mut self, path: impl Into<String>) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    /// Pass one more flag to Chrome, e.g. `"lang=en-US"`.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.config.extra_args.push(arg.into());
        self
    }

    pub fn load_timeout(mut self, timeout: Duration) -> Self {
        self.config.load_timeout = timeout;
        self
    }

    /// Timings used by [`AutofillBrowser::autofill`].
    pub fn autofill(mut self, autofill: AutofillConfig) -> Self {
        self.config.autofill = autofill;
        self
    }

    pub fn build_config(self) -> BrowserConfig {
        self.config
    }

    pub async fn build(self) -> Result<AutofillBrowser> {
        AutofillBrowser::launch(self.build_config()).await
    }
}

/// Timing of the automatic fill flow.
#[derive(Debug, Clone)]
pub struct AutofillConfig {
    /// Extra wait after the document stops loading (default: 800ms).
    pub settle_delay: Duration,
    /// Passes run right after the page settles, counting the first (default: 3).
    pub max_attempts: usize,
    /// Pause between those passes (default: 500ms).
    pub retry_delay: Duration,
    /// Minimum spacing between change-triggered passes (default: 3s).
    pub cooldown: Duration,
    /// Wait between a qualifying change and the pass it triggers (default: 1s).
    pub debounce: Duration,
    pub storage_key: String,
}

impl Default for AutofillConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(800),
            max_attempts: 3,
            retry_delay: Duration::from_millis(500),
            cooldown: Duration::from_millis(3000),
            debounce: Duration::from_millis(1000),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

impl AutofillConfig {
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Values below one are raised to one: the first pass always runs.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }
}
