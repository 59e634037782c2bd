//! Locator suggestions for the text fields of a page, consumed by the
//! configuration UI when a user picks which fields to fill.

use serde::Serialize;

use crate::dom::{InputDescriptor, PathSegment};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorCandidate {
    pub index: usize,
    pub tag_name: String,
    #[serde(rename = "type")]
    pub input_type: String,
    pub id: String,
    pub name: String,
    pub class_name: String,
    pub placeholder: String,
    pub xpath: String,
    pub css_selector: String,
}

impl SelectorCandidate {
    pub fn from_descriptor(index: usize, desc: &InputDescriptor) -> Self {
        Self {
            index,
            tag_name: desc.tag_name.clone(),
            input_type: desc
                .input_type
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "text".to_string()),
            id: desc.id.clone(),
            name: desc.name.clone().unwrap_or_default(),
            class_name: desc.class_name.clone(),
            placeholder: desc.placeholder.clone().unwrap_or_default(),
            xpath: absolute_xpath(&desc.path),
            css_selector: css_selector(desc),
        }
    }
}

pub fn candidates(inputs: &[InputDescriptor]) -> Vec<SelectorCandidate> {
    inputs
        .iter()
        .enumerate()
        .map(|(index, desc)| SelectorCandidate::from_descriptor(index, desc))
        .collect()
}

/// Absolute XPath for an element given its ancestry from `<html>`.
///
/// The root and its direct children are written without a position
/// (`/html`, `/html/body`); every deeper step carries its 1-based position
/// among same-tag siblings.
pub fn absolute_xpath(path: &[PathSegment]) -> String {
    let mut xpath = String::new();
    for (depth, segment) in path.iter().enumerate() {
        if depth < 2 {
            xpath.push('/');
            xpath.push_str(&segment.tag);
        } else {
            xpath.push_str(&format!("/{}[{}]", segment.tag, segment.position));
        }
    }
    xpath
}

/// Best-effort CSS selector: id, then classes, then the name attribute,
/// then the bare tag name.
pub fn css_selector(desc: &InputDescriptor) -> String {
    let tag = desc.tag_name.to_lowercase();
    if !desc.id.is_empty() {
        return format!("#{}", desc.id);
    }

    let classes: String = desc
        .class_name
        .split_whitespace()
        .map(|class| format!(".{class}"))
        .collect();
    if !classes.is_empty() {
        return format!("{tag}{classes}");
    }

    match desc.name.as_deref().filter(|n| !n.is_empty()) {
        Some(name) => format!("{tag}[name=\"{name}\"]"),
        None => tag,
    }
}
