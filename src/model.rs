use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Separator between a domain config id and the suffix of an account id.
pub const ID_SEPARATOR: char = '-';

/// Generate a unique id. Ids never contain [`ID_SEPARATOR`], so they are safe
/// to use as account id prefixes.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Whether two distinct config ids are ambiguous as account id prefixes,
/// i.e. one of them followed by [`ID_SEPARATOR`] starts the other.
pub fn ids_overlap(a: &str, b: &str) -> bool {
    let extends = |long: &str, short: &str| {
        long.strip_prefix(short)
            .is_some_and(|rest| rest.starts_with(ID_SEPARATOR))
    };
    a != b && (extends(a, b) || extends(b, a))
}

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// How a [`SelectorItem`] addresses its element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorType {
    Css,
    Xpath,
}

impl std::fmt::Display for SelectorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectorType::Css => f.write_str("css"),
            SelectorType::Xpath => f.write_str("xpath"),
        }
    }
}

/// One field locator of a domain config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub selector: String,
    pub selector_type: SelectorType,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl SelectorItem {
    pub fn new(selector: impl Into<String>, selector_type: SelectorType) -> Self {
        let now = now_millis();
        Self {
            id: generate_id(),
            alias: None,
            selector: selector.into(),
            selector_type,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Name used in log lines: the alias when set, otherwise the id.
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.id)
    }
}

/// Per-domain configuration: a hostname pattern and the fields to fill on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainConfig {
    pub id: String,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default)]
    pub selectors: Vec<SelectorItem>,
    #[serde(default)]
    pub default_account_id: Option<String>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl DomainConfig {
    pub fn new(domain: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: generate_id(),
            domain: domain.into(),
            alias: None,
            selectors: Vec::new(),
            default_account_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_selector(mut self, selector: SelectorItem) -> Self {
        self.selectors.push(selector);
        self
    }

    /// Prefix shared by the ids of accounts created under this config.
    pub fn account_prefix(&self) -> String {
        format!("{}{}", self.id, ID_SEPARATOR)
    }
}

/// A named set of values, one per selector, owned by one domain config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    /// Owning domain config. Older snapshots omit it; the store derives it
    /// from the id prefix when the snapshot is read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub auto_fill: bool,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub selector_values: HashMap<String, String>,
    /// Pre-selector credential fields. Never filled; kept so exports
    /// return what was imported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl Account {
    /// Create an account owned by `parent_id`, with an id of the form
    /// `<parent_id>-<suffix>`.
    pub fn new(parent_id: impl Into<String>, label: impl Into<String>) -> Self {
        let parent_id = parent_id.into();
        let now = now_millis();
        Self {
            id: format!("{parent_id}{ID_SEPARATOR}{}", generate_id()),
            parent_id: Some(parent_id),
            label: label.into(),
            auto_fill: true,
            is_default: false,
            selector_values: HashMap::new(),
            username: None,
            password: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_value(mut self, selector_id: impl Into<String>, value: impl Into<String>) -> Self {
        self.selector_values.insert(selector_id.into(), value.into());
        self
    }

    pub fn is_owned_by(&self, domain_config_id: &str) -> bool {
        self.parent_id.as_deref() == Some(domain_config_id)
    }

    /// Whether the id has the `<parent_id>-` shape for the given parent.
    pub fn id_matches_parent(&self, parent_id: &str) -> bool {
        self.id
            .strip_prefix(parent_id)
            .is_some_and(|rest| rest.starts_with(ID_SEPARATOR))
    }

    /// Non-empty value saved for a selector, if any.
    pub fn value_for(&self, selector_id: &str) -> Option<&str> {
        self.selector_values
            .get(selector_id)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// The whole persisted state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageData {
    #[serde(default)]
    pub domain_configs: Vec<DomainConfig>,
    #[serde(default)]
    pub accounts: Vec<Account>,
    /// Legacy rule list, carried through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<serde_json::Value>>,
}

impl StorageData {
    /// Resolve the owning config of an account from its id prefix. When several
    /// config ids prefix the account id, the longest one wins.
    pub fn derive_parent(&self, account_id: &str) -> Option<String> {
        self.domain_configs
            .iter()
            .filter(|c| account_id.starts_with(&c.account_prefix()))
            .max_by_key(|c| c.id.len())
            .map(|c| c.id.clone())
    }

    /// Fill in `parent_id` for accounts saved before ownership was explicit.
    pub fn normalize(&mut self) {
        let derived: Vec<Option<String>> = self
            .accounts
            .iter()
            .map(|a| match a.parent_id {
                Some(_) => None,
                None => self.derive_parent(&a.id),
            })
            .collect();
        for (account, parent) in self.accounts.iter_mut().zip(derived) {
            if parent.is_some() {
                account.parent_id = parent;
            }
        }
    }
}

/// A domain config together with the accounts it owns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainWithAccounts {
    pub config: DomainConfig,
    pub accounts: Vec<Account>,
}
