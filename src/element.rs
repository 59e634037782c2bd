use chromiumoxide::element::Element as CrElement;
use serde_json::Value;

use crate::dom::{DomEvent, ElementKind};
use crate::error::{Error, Result};

/// Wrapper around a chromiumoxide Element, exposing the writes a fill needs.
pub struct Element {
    inner: CrElement,
}

impl Element {
    pub(crate) fn new(inner: CrElement) -> Self {
        Self { inner }
    }

    /// Returns a reference to the underlying chromiumoxide Element.
    pub fn inner(&self) -> &CrElement {
        &self.inner
    }

    /// Call a JS function with `this` bound to the element.
    async fn call(&self, function: String) -> Result<Option<Value>> {
        let returns = self
            .inner
            .call_js_fn(function, false)
            .await
            .map_err(|e| Error::JsError(e.to_string()))?;
        if let Some(details) = returns.exception_details {
            return Err(Error::JsError(details.text));
        }
        Ok(returns.result.value)
    }

    /// Get the value of an attribute on this element.
    pub async fn get_attribute(&self, name: &str) -> Result<Option<String>> {
        Ok(self.inner.attribute(name).await?)
    }

    /// Tag name as the DOM reports it.
    pub async fn tag_name(&self) -> Result<String> {
        let value = self.call("function() { return this.tagName; }".to_string()).await?;
        Ok(value
            .as_ref()
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    pub async fn kind(&self) -> Result<ElementKind> {
        let tag = self.tag_name().await?;
        let editable = self.get_attribute("contenteditable").await?;
        Ok(ElementKind::classify(&tag, editable.as_deref()))
    }

    /// Assign through the instance's `value` property.
    pub async fn assign_value(&self, value: &str) -> Result<()> {
        let value_js = serde_json::to_string(value)?;
        self.call(format!("function() {{ this.value = {value_js}; }}"))
            .await?;
        Ok(())
    }

    /// Assign through the native `value` setter of the element's prototype,
    /// skipping any setter a framework installed on the instance.
    pub async fn assign_native_value(&self, kind: ElementKind, value: &str) -> Result<()> {
        let proto = match kind {
            ElementKind::TextArea => "HTMLTextAreaElement",
            _ => "HTMLInputElement",
        };
        let value_js = serde_json::to_string(value)?;
        self.call(format!(
            r#"function() {{
                const descriptor = Object.getOwnPropertyDescriptor(window.{proto}.prototype, 'value');
                if (descriptor && descriptor.set) descriptor.set.call(this, {value_js});
            }}"#
        ))
        .await?;
        Ok(())
    }

    pub async fn set_text_content(&self, value: &str) -> Result<()> {
        let value_js = serde_json::to_string(value)?;
        self.call(format!("function() {{ this.textContent = {value_js}; }}"))
            .await?;
        Ok(())
    }

    /// Dispatch a bubbling synthetic event on this element.
    pub async fn dispatch(&self, event: DomEvent) -> Result<()> {
        self.call(format!(
            "function() {{ this.dispatchEvent(new Event('{}', {{ bubbles: true }})); }}",
            event.name()
        ))
        .await?;
        Ok(())
    }
}
