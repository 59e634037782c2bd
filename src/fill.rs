use tracing::{debug, info, warn};

use crate::dom::Document;
use crate::error::Result;
use crate::injector;
use crate::resolver;
use crate::storage::StorageBackend;
use crate::store::CredentialStore;

/// Why a fill pass did not fill anything. None of these are errors: the pass
/// ran and reports what it found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillFailure {
    /// No domain config matches the page's hostname.
    ConfigNotFound,
    /// No account to use, or the account has auto-fill disabled.
    AccountUnavailable,
    NoSelectorsConfigured,
    NoSelectorValues,
    /// Every field was skipped.
    NothingFilled,
}

impl FillFailure {
    pub fn message(self) -> &'static str {
        match self {
            FillFailure::ConfigNotFound => "no domain config matches this page",
            FillFailure::AccountUnavailable => "no account found, or auto-fill is disabled for it",
            FillFailure::NoSelectorsConfigured => "the domain config has no selectors",
            FillFailure::NoSelectorValues => "the account has no selector values",
            FillFailure::NothingFilled => "no fillable input was found",
        }
    }

    /// Only an empty pass is worth repeating; the other failures depend on
    /// stored configuration, not on page timing.
    pub fn is_retryable(self) -> bool {
        matches!(self, FillFailure::NothingFilled)
    }
}

impl std::fmt::Display for FillFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldStatus {
    Filled,
    /// The account has no value (or an empty one) for this selector.
    MissingValue,
    ElementNotFound,
    /// The element was found but writing to it failed.
    WriteFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOutcome {
    pub selector_id: String,
    pub status: FieldStatus,
}

/// Result of one fill pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillReport {
    pub filled_count: usize,
    pub total_selectors: usize,
    /// Per-selector outcome, in configured order. Empty when the pass aborted.
    pub fields: Vec<FieldOutcome>,
    pub failure: Option<FillFailure>,
    pub account_label: Option<String>,
}

impl FillReport {
    fn aborted(failure: FillFailure) -> Self {
        Self {
            failure: Some(failure),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.filled_count > 0
    }
}

/// Run one fill pass against the page.
///
/// With `account_id` set, that account of the matching config is used;
/// otherwise the config's default account. Fields are handled one by one in
/// configured order. A field that cannot be resolved or written is skipped.
pub async fn run_fill_pass<B, D>(
    store: &CredentialStore<B>,
    document: &D,
    account_id: Option<&str>,
) -> Result<FillReport>
where
    B: StorageBackend,
    D: Document + ?Sized,
{
    let hostname = document.hostname().await?;

    let Some(config) = store.find_by_domain(&hostname).await? else {
        debug!(%hostname, "no domain config for host");
        return Ok(FillReport::aborted(FillFailure::ConfigNotFound));
    };

    let account = match account_id {
        Some(id) => store
            .get_accounts_by_domain_config_id(&config.id)
            .await?
            .into_iter()
            .find(|a| a.id == id),
        None => store.get_default_account(&config.id).await?,
    };
    let Some(account) = account.filter(|a| a.auto_fill) else {
        return Ok(FillReport::aborted(FillFailure::AccountUnavailable));
    };

    if config.selectors.is_empty() {
        return Ok(FillReport::aborted(FillFailure::NoSelectorsConfigured));
    }
    if account.selector_values.is_empty() {
        return Ok(FillReport::aborted(FillFailure::NoSelectorValues));
    }

    let mut report = FillReport {
        total_selectors: config.selectors.len(),
        account_label: Some(account.label.clone()),
        ..FillReport::default()
    };

    for item in &config.selectors {
        let name = item.display_name();
        let status = match account.value_for(&item.id) {
            None => {
                warn!(selector = name, "no value saved for selector");
                FieldStatus::MissingValue
            }
            Some(value) => match resolver::resolve(document, &item.selector, item.selector_type).await {
                Ok(Some(target)) => match injector::fill(document, &target, value).await {
                    Ok(()) => {
                        info!(selector = name, value = %injector::mask(value), "field filled");
                        FieldStatus::Filled
                    }
                    Err(e) => {
                        warn!(selector = name, error = %e, "writing field failed");
                        FieldStatus::WriteFailed(e.to_string())
                    }
                },
                Ok(None) => {
                    warn!(
                        selector = name,
                        kind = %item.selector_type,
                        locator = %item.selector,
                        "no fillable element for selector"
                    );
                    FieldStatus::ElementNotFound
                }
                Err(e) => {
                    warn!(selector = name, error = %e, "resolving selector failed");
                    FieldStatus::ElementNotFound
                }
            },
        };
        if status == FieldStatus::Filled {
            report.filled_count += 1;
        }
        report.fields.push(FieldOutcome {
            selector_id: item.id.clone(),
            status,
        });
    }

    if report.filled_count == 0 {
        report.failure = Some(FillFailure::NothingFilled);
    } else {
        info!(
            filled = report.filled_count,
            total = report.total_selectors,
            account = %account.label,
            "fill pass complete"
        );
    }
    Ok(report)
}
