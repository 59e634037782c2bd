use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::js_protocol::runtime::{AddBindingParams, EventBindingCalled};
use chromiumoxide::page::Page as CrPage;
use futures::StreamExt;
use tracing::debug;

use crate::dom::{
    ChangeBatch, ChangeSource, ChangeStream, Document, DomEvent, ElementKind, InputDescriptor,
};
use crate::element::Element;
use crate::error::{Error, Result};

/// Name of the page binding the change observer reports through.
const CHANGE_BINDING: &str = "__autofillPageChanged";

/// Installs a subtree observer on `<body>`, waiting for `<body>` to exist first.
static CHANGE_OBSERVER_JS: &str = r#"
(() => {
    if (window.__autofillObserver) return;
    const observer = new MutationObserver((records) => {
        window.__autofillPageChanged(String(records.length));
    });
    const attach = () => observer.observe(document.body, { childList: true, subtree: true });
    if (document.body) {
        attach();
    } else {
        const waitForBody = new MutationObserver(() => {
            if (document.body) {
                attach();
                waitForBody.disconnect();
            }
        });
        waitForBody.observe(document.documentElement, { childList: true });
    }
    window.__autofillObserver = observer;
})()
"#;

/// Describes every text-like field together with its ancestry.
static TEXT_INPUTS_JS: &str = r#"
JSON.stringify(
    Array.from(document.querySelectorAll(
        "input[type='text'], input[type='email'], input[type='password'], textarea"
    )).map(el => {
        const path = [];
        for (let node = el; node && node.nodeType === Node.ELEMENT_NODE; node = node.parentElement) {
            let position = 1;
            for (let sib = node.previousElementSibling; sib; sib = sib.previousElementSibling) {
                if (sib.tagName === node.tagName) position++;
            }
            path.unshift({ tag: node.tagName.toLowerCase(), position });
        }
        return {
            tagName: el.tagName,
            inputType: el.getAttribute('type'),
            id: el.id || '',
            name: el.getAttribute('name'),
            className: typeof el.className === 'string' ? el.className : '',
            placeholder: el.getAttribute('placeholder'),
            path
        };
    })
)
"#;

/// Wrapper around a chromiumoxide Page implementing [`Document`] and
/// [`ChangeSource`] over CDP.
pub struct Page {
    inner: CrPage,
    load_timeout: Duration,
}

impl Page {
    pub(crate) fn new(inner: CrPage, load_timeout: Duration) -> Self {
        Self { inner, load_timeout }
    }

    /// Returns a reference to the underlying chromiumoxide Page.
    pub fn inner(&self) -> &CrPage {
        &self.inner
    }

    /// Navigate to the given URL and wait for the page to load.
    pub async fn goto(&self, url: &str) -> Result<()> {
        self.inner
            .goto(url)
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?;
        Ok(())
    }

    /// Get the current page URL.
    pub async fn url(&self) -> Result<String> {
        self.inner
            .url()
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?
            .ok_or_else(|| Error::NavigationError("No URL found".into()))
    }

    /// Evaluate a JavaScript expression and deserialize its result.
    async fn eval<T: serde::de::DeserializeOwned>(&self, expression: &str) -> Result<T> {
        self.inner
            .evaluate(expression)
            .await
            .map_err(|e| Error::JsError(e.to_string()))?
            .into_value()
            .map_err(|e| Error::JsError(e.to_string()))
    }

    /// Value of an input as the page currently sees it.
    pub async fn input_value(&self, selector: &str) -> Result<String> {
        let selector_js = serde_json::to_string(selector)?;
        self.eval(&format!(
            "(() => {{ const el = document.querySelector({selector_js}); return el ? el.value : ''; }})()"
        ))
        .await
    }
}

#[async_trait]
impl Document for Page {
    type Node = Element;

    async fn hostname(&self) -> Result<String> {
        self.eval("window.location.hostname").await
    }

    /// Polls `document.readyState` every 100ms up to the load timeout.
    async fn wait_until_loaded(&self) -> Result<()> {
        let interval = Duration::from_millis(100);
        let start = std::time::Instant::now();

        loop {
            let state: String = self.eval("document.readyState").await?;
            if state != "loading" {
                return Ok(());
            }
            if start.elapsed() >= self.load_timeout {
                return Err(Error::Timeout("document to finish loading".into()));
            }
            tokio::time::sleep(interval).await;
        }
    }

    async fn query_css(&self, selector: &str) -> Result<Option<Element>> {
        match self.inner.find_element(selector).await {
            Ok(el) => Ok(Some(Element::new(el))),
            Err(e) => {
                debug!(selector, error = %e, "css query found nothing");
                Ok(None)
            }
        }
    }

    async fn query_xpath(&self, expression: &str) -> Result<Option<Element>> {
        match self.inner.find_xpath(expression).await {
            Ok(el) => Ok(Some(Element::new(el))),
            Err(e) => {
                debug!(expression, error = %e, "xpath query found nothing");
                Ok(None)
            }
        }
    }

    async fn element_kind(&self, node: &Element) -> Result<ElementKind> {
        node.kind().await
    }

    async fn set_value(&self, node: &Element, value: &str) -> Result<()> {
        node.assign_value(value).await
    }

    async fn set_native_value(&self, node: &Element, kind: ElementKind, value: &str) -> Result<()> {
        node.assign_native_value(kind, value).await
    }

    async fn set_text_content(&self, node: &Element, value: &str) -> Result<()> {
        node.set_text_content(value).await
    }

    async fn dispatch_event(&self, node: &Element, event: DomEvent) -> Result<()> {
        node.dispatch(event).await
    }

    async fn text_inputs(&self) -> Result<Vec<InputDescriptor>> {
        let json_str: String = self.eval(TEXT_INPUTS_JS).await?;
        Ok(serde_json::from_str(&json_str)?)
    }
}

#[async_trait]
impl ChangeSource for Page {
    async fn subscribe(&self) -> Result<ChangeStream> {
        // Listen before the binding exists so no early notification is lost.
        let events = self
            .inner
            .event_listener::<EventBindingCalled>()
            .await
            .map_err(|e| Error::JsError(format!("Failed to listen for binding calls: {e}")))?;

        self.inner
            .execute(AddBindingParams::new(CHANGE_BINDING))
            .await
            .map_err(|e| Error::JsError(format!("Failed to add change binding: {e}")))?;
        self.inner
            .evaluate(CHANGE_OBSERVER_JS)
            .await
            .map_err(|e| Error::JsError(format!("Failed to install change observer: {e}")))?;

        let stream = events
            .filter(|event| futures::future::ready(event.name == CHANGE_BINDING))
            .map(|event| ChangeBatch {
                records: event.payload.parse().unwrap_or(0),
            })
            .boxed();
        Ok(stream)
    }
}
