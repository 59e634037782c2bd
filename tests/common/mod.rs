#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::channel::mpsc::UnboundedReceiver;
use futures::StreamExt;

use domain_autofill::dom::{
    ChangeBatch, ChangeSource, ChangeStream, Document, DomEvent, ElementKind, InputDescriptor,
};
use domain_autofill::{
    Account, CredentialStore, DomainConfig, Error, MemoryBackend, Result, SelectorItem, SelectorType,
};

/// An element of the fake page.
#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    pub tag: String,
    pub content_editable: bool,
    /// Value as seen through the element's `value` property.
    pub value: String,
    /// Value as seen by a framework that only tracks native-setter writes.
    pub framework_value: String,
    pub text: String,
    /// The instance setter is overridden, so plain assignments bypass the
    /// framework's tracker.
    pub shadowed_setter: bool,
    pub events: Vec<&'static str>,
}

impl FakeElement {
    pub fn input() -> Self {
        Self { tag: "INPUT".into(), ..Self::default() }
    }

    pub fn textarea() -> Self {
        Self { tag: "TEXTAREA".into(), ..Self::default() }
    }

    pub fn editable_div() -> Self {
        Self { tag: "DIV".into(), content_editable: true, ..Self::default() }
    }

    pub fn div() -> Self {
        Self { tag: "DIV".into(), ..Self::default() }
    }

    pub fn framework_input() -> Self {
        Self { shadowed_setter: true, ..Self::input() }
    }
}

#[derive(Default)]
struct FakeState {
    elements: Vec<FakeElement>,
    css: HashMap<String, usize>,
    xpath: HashMap<String, usize>,
    inputs: Vec<InputDescriptor>,
    calls: Vec<String>,
    broken_selectors: Vec<String>,
}

/// In-memory page used in place of a browser.
pub struct FakeDocument {
    hostname: String,
    state: Mutex<FakeState>,
}

impl FakeDocument {
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            state: Mutex::new(FakeState::default()),
        }
    }

    /// Add an element reachable by the given CSS selector and/or XPath.
    pub fn add(&self, css: Option<&str>, xpath: Option<&str>, element: FakeElement) -> usize {
        let mut state = self.state.lock().unwrap();
        let idx = state.elements.len();
        state.elements.push(element);
        if let Some(css) = css {
            state.css.insert(css.to_string(), idx);
        }
        if let Some(xpath) = xpath {
            state.xpath.insert(xpath.to_string(), idx);
        }
        idx
    }

    /// Make queries for this locator fail as an invalid selector would.
    pub fn break_selector(&self, selector: &str) {
        self.state.lock().unwrap().broken_selectors.push(selector.to_string());
    }

    pub fn set_inputs(&self, inputs: Vec<InputDescriptor>) {
        self.state.lock().unwrap().inputs = inputs;
    }

    /// Empty an element's value the way a user deleting the text would.
    pub fn clear(&self, idx: usize) {
        let mut state = self.state.lock().unwrap();
        let el = &mut state.elements[idx];
        el.value.clear();
        el.framework_value.clear();
    }

    pub fn element(&self, idx: usize) -> FakeElement {
        self.state.lock().unwrap().elements[idx].clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn lookup(&self, xpath: bool, key: &str) -> Result<Option<usize>> {
        let state = self.state.lock().unwrap();
        if state.broken_selectors.iter().any(|s| s == key) {
            return Err(Error::JsError(format!("invalid selector: {key}")));
        }
        let map = if xpath { &state.xpath } else { &state.css };
        Ok(map.get(key).copied())
    }

    fn with_element(&self, idx: usize, call: String, f: impl FnOnce(&mut FakeElement)) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        f(&mut state.elements[idx]);
    }
}

#[async_trait]
impl Document for FakeDocument {
    type Node = usize;

    async fn hostname(&self) -> Result<String> {
        Ok(self.hostname.clone())
    }

    async fn wait_until_loaded(&self) -> Result<()> {
        Ok(())
    }

    async fn query_css(&self, selector: &str) -> Result<Option<usize>> {
        self.lookup(false, selector)
    }

    async fn query_xpath(&self, expression: &str) -> Result<Option<usize>> {
        self.lookup(true, expression)
    }

    async fn element_kind(&self, node: &usize) -> Result<ElementKind> {
        let el = self.element(*node);
        let editable = el.content_editable.then_some("true");
        Ok(ElementKind::classify(&el.tag, editable))
    }

    async fn set_value(&self, node: &usize, value: &str) -> Result<()> {
        self.with_element(*node, format!("set_value#{node}"), |el| {
            el.value = value.to_string();
            if !el.shadowed_setter {
                el.framework_value = value.to_string();
            }
        });
        Ok(())
    }

    async fn set_native_value(&self, node: &usize, kind: ElementKind, value: &str) -> Result<()> {
        self.with_element(*node, format!("native_value:{kind:?}#{node}"), |el| {
            el.value = value.to_string();
            el.framework_value = value.to_string();
        });
        Ok(())
    }

    async fn set_text_content(&self, node: &usize, value: &str) -> Result<()> {
        self.with_element(*node, format!("text_content#{node}"), |el| {
            el.text = value.to_string();
        });
        Ok(())
    }

    async fn dispatch_event(&self, node: &usize, event: DomEvent) -> Result<()> {
        self.with_element(*node, format!("{}#{node}", event.name()), |el| {
            el.events.push(event.name());
        });
        Ok(())
    }

    async fn text_inputs(&self) -> Result<Vec<InputDescriptor>> {
        Ok(self.state.lock().unwrap().inputs.clone())
    }
}

/// Change source handing out one prepared channel.
pub struct FakeChanges {
    receiver: Mutex<Option<UnboundedReceiver<ChangeBatch>>>,
}

impl FakeChanges {
    pub fn new(receiver: UnboundedReceiver<ChangeBatch>) -> Self {
        Self { receiver: Mutex::new(Some(receiver)) }
    }

    pub fn subscribed(&self) -> bool {
        self.receiver.lock().unwrap().is_none()
    }
}

#[async_trait]
impl ChangeSource for FakeChanges {
    async fn subscribe(&self) -> Result<ChangeStream> {
        let receiver = self
            .receiver
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::JsError("already subscribed".into()))?;
        Ok(receiver.boxed())
    }
}

pub const USER_CSS: &str = "#user";
pub const PASS_XPATH: &str = "//input[@name='pass']";

/// A store holding one login config (username by CSS, password by XPath)
/// and one account with values for both.
pub struct Seeded {
    pub store: Arc<CredentialStore<MemoryBackend>>,
    pub config: DomainConfig,
    pub account: Account,
}

impl Seeded {
    pub fn user_selector(&self) -> &SelectorItem {
        &self.config.selectors[0]
    }

    pub fn pass_selector(&self) -> &SelectorItem {
        &self.config.selectors[1]
    }
}

pub async fn seed_login(domain: &str) -> Seeded {
    let store = Arc::new(CredentialStore::new(MemoryBackend::new()));
    let user = SelectorItem::new(USER_CSS, SelectorType::Css).with_alias("username");
    let pass = SelectorItem::new(PASS_XPATH, SelectorType::Xpath).with_alias("password");
    let config = DomainConfig::new(domain)
        .with_selector(user.clone())
        .with_selector(pass.clone());
    let config = store.save_domain_config(config).await.unwrap();

    let account = Account::new(&config.id, "work")
        .with_value(&user.id, "alice")
        .with_value(&pass.id, "s3cret");
    let account = store.save_account(account).await.unwrap();

    Seeded { store, config, account }
}

/// A page with both login fields present.
pub fn login_page(hostname: &str) -> (Arc<FakeDocument>, usize, usize) {
    let doc = Arc::new(FakeDocument::new(hostname));
    let user = doc.add(Some(USER_CSS), None, FakeElement::input());
    let pass = doc.add(None, Some(PASS_XPATH), FakeElement::input());
    (doc, user, pass)
}
