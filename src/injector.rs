use crate::dom::{Document, DomEvent};
use crate::error::Result;
use crate::resolver::Resolved;

/// Write `value` into a resolved element.
///
/// Inputs and textareas get a two-step write. First the value goes through
/// the element's own property, followed by bubbling `input` and `change`
/// events for native listeners. Then the prototype's native setter is called
/// directly and `input` is dispatched again: frameworks that shadow the
/// setter on their component instances track state from that second write.
///
/// Contenteditable elements get their text content replaced and one `input`.
pub async fn fill<D: Document + ?Sized>(
    document: &D,
    target: &Resolved<D::Node>,
    value: &str,
) -> Result<()> {
    let node = &target.node;
    if target.kind.has_value_property() {
        document.set_value(node, value).await?;
        document.dispatch_event(node, DomEvent::Input).await?;
        document.dispatch_event(node, DomEvent::Change).await?;

        document.set_native_value(node, target.kind, value).await?;
        document.dispatch_event(node, DomEvent::Input).await?;
    } else {
        document.set_text_content(node, value).await?;
        document.dispatch_event(node, DomEvent::Input).await?;
    }
    Ok(())
}

/// Log-safe rendering of a value: its first three characters, then `***`.
pub fn mask(value: &str) -> String {
    let head: String = value.chars().take(3).collect();
    format!("{head}***")
}
