//! The page as the fill engine sees it.
//!
//! [`Document`] covers the handful of DOM operations a fill pass needs and
//! [`ChangeSource`] delivers subtree-change notifications. The Chrome page in
//! [`crate::page`] implements both over CDP.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What a resolved node is, as far as filling is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Input,
    TextArea,
    /// Carries `contenteditable="true"`.
    ContentEditable,
    Other,
}

impl ElementKind {
    /// Classify from an upper- or lower-case tag name and the raw
    /// `contenteditable` attribute.
    pub fn classify(tag_name: &str, content_editable: Option<&str>) -> Self {
        if tag_name.eq_ignore_ascii_case("input") {
            ElementKind::Input
        } else if tag_name.eq_ignore_ascii_case("textarea") {
            ElementKind::TextArea
        } else if content_editable == Some("true") {
            ElementKind::ContentEditable
        } else {
            ElementKind::Other
        }
    }

    pub fn is_fillable(self) -> bool {
        !matches!(self, ElementKind::Other)
    }

    /// Whether the value is written through a `value` property.
    pub fn has_value_property(self) -> bool {
        matches!(self, ElementKind::Input | ElementKind::TextArea)
    }
}

/// Synthetic events dispatched after a write. Both bubble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomEvent {
    Input,
    Change,
}

impl DomEvent {
    pub fn name(self) -> &'static str {
        match self {
            DomEvent::Input => "input",
            DomEvent::Change => "change",
        }
    }
}

/// One step of an element's ancestry, from `<html>` downwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSegment {
    /// Lower-case tag name.
    pub tag: String,
    /// 1-based position among element siblings with the same tag.
    pub position: usize,
}

impl PathSegment {
    pub fn new(tag: impl Into<String>, position: usize) -> Self {
        Self {
            tag: tag.into(),
            position,
        }
    }
}

/// Raw facts about a text-like field, used to suggest locators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDescriptor {
    /// Tag name as the DOM reports it (upper-case for HTML).
    pub tag_name: String,
    /// The `type` attribute, when present.
    pub input_type: Option<String>,
    pub id: String,
    pub name: Option<String>,
    pub class_name: String,
    pub placeholder: Option<String>,
    /// Ancestry from the document root to the element itself.
    pub path: Vec<PathSegment>,
}

/// DOM operations used by the resolver, the injector and the fill pass.
#[async_trait]
pub trait Document: Send + Sync {
    /// Handle to a live element.
    type Node: Send + Sync;

    /// Hostname of the page's current location.
    async fn hostname(&self) -> Result<String>;

    /// Resolve once the document is no longer `loading`.
    async fn wait_until_loaded(&self) -> Result<()>;

    /// First element matching a CSS selector, in document order.
    async fn query_css(&self, selector: &str) -> Result<Option<Self::Node>>;

    /// First ordered node matching an XPath expression.
    async fn query_xpath(&self, expression: &str) -> Result<Option<Self::Node>>;

    async fn element_kind(&self, node: &Self::Node) -> Result<ElementKind>;

    /// Assign `value` through the element's own `value` property, which a
    /// framework may have overridden on the instance.
    async fn set_value(&self, node: &Self::Node, value: &str) -> Result<()>;

    /// Assign `value` through the prototype-level native setter of `kind`,
    /// bypassing any instance override.
    async fn set_native_value(&self, node: &Self::Node, kind: ElementKind, value: &str) -> Result<()>;

    async fn set_text_content(&self, node: &Self::Node, value: &str) -> Result<()>;

    async fn dispatch_event(&self, node: &Self::Node, event: DomEvent) -> Result<()>;

    /// Every `input[type=text|email|password]` and `textarea`, in document order.
    async fn text_inputs(&self) -> Result<Vec<InputDescriptor>>;
}

/// One notification that the page's DOM subtree changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    /// Mutation records folded into this batch, when the source knows it.
    pub records: usize,
}

/// Stream of change batches. Dropping it unsubscribes.
pub type ChangeStream = BoxStream<'static, ChangeBatch>;

/// Subscribe to DOM subtree changes.
#[async_trait]
pub trait ChangeSource: Send + Sync {
    async fn subscribe(&self) -> Result<ChangeStream>;
}
