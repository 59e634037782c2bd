use tracing::debug;

use crate::dom::{Document, ElementKind};
use crate::error::Result;
use crate::model::SelectorType;

/// A node the resolver accepted, with its kind already known.
pub struct Resolved<N> {
    pub node: N,
    pub kind: ElementKind,
}

/// Resolve a stored locator to a fillable element.
///
/// A node that matches but is neither an input, a textarea nor
/// `contenteditable` is reported as not found, so locators pointing at a
/// wrapping container never receive a value.
pub async fn resolve<D: Document + ?Sized>(
    document: &D,
    selector: &str,
    selector_type: SelectorType,
) -> Result<Option<Resolved<D::Node>>> {
    let node = match selector_type {
        SelectorType::Css => document.query_css(selector).await?,
        SelectorType::Xpath => document.query_xpath(selector).await?,
    };
    let Some(node) = node else {
        return Ok(None);
    };

    let kind = document.element_kind(&node).await?;
    if !kind.is_fillable() {
        debug!(selector, %selector_type, "locator matched a non-fillable element");
        return Ok(None);
    }
    Ok(Some(Resolved { node, kind }))
}
