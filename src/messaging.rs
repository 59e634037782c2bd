//! Request/response interface used by the configuration UI to drive the
//! engine on the current page.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::candidates::{candidates, SelectorCandidate};
use crate::dom::Document;
use crate::error::Result;
use crate::fill::{run_fill_pass, FillReport};
use crate::storage::StorageBackend;
use crate::store::CredentialStore;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    /// Fill the page now with the default account or the given one.
    #[serde(rename_all = "camelCase")]
    Fill {
        #[serde(default)]
        account_id: Option<String>,
    },
    /// List the page's text fields with suggested locators.
    GetSelectors,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FillResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filled_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_selectors: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl FillResponse {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

impl From<&FillReport> for FillResponse {
    fn from(report: &FillReport) -> Self {
        let ran = report.total_selectors > 0;
        Self {
            success: report.is_success(),
            filled_count: ran.then_some(report.filled_count),
            total_selectors: ran.then_some(report.total_selectors),
            message: report.failure.map(|f| f.message().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Fill(FillResponse),
    Selectors { selectors: Vec<SelectorCandidate> },
}

/// Answers UI requests for one page. Explicit fills run exactly one pass
/// right away, regardless of what the automatic flow has done.
pub struct MessageHandler<B, D> {
    store: Arc<CredentialStore<B>>,
    document: Arc<D>,
}

impl<B, D> MessageHandler<B, D>
where
    B: StorageBackend,
    D: Document,
{
    pub fn new(store: Arc<CredentialStore<B>>, document: Arc<D>) -> Self {
        Self { store, document }
    }

    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::Fill { account_id } => Response::Fill(self.fill(account_id.as_deref()).await),
            Request::GetSelectors => Response::Selectors {
                selectors: self.selectors().await,
            },
        }
    }

    /// Handle a raw JSON message. Requests with an unknown action get a
    /// failed fill response; text that is not JSON at all is an error.
    pub async fn handle_json(&self, raw: &str) -> Result<String> {
        let value: Value = serde_json::from_str(raw)?;
        let response = match serde_json::from_value::<Request>(value) {
            Ok(request) => self.handle(request).await,
            Err(e) => Response::Fill(FillResponse::failed(format!("unsupported request: {e}"))),
        };
        Ok(serde_json::to_string(&response)?)
    }

    async fn fill(&self, account_id: Option<&str>) -> FillResponse {
        match run_fill_pass(self.store.as_ref(), self.document.as_ref(), account_id).await {
            Ok(report) => {
                info!(
                    success = report.is_success(),
                    filled = report.filled_count,
                    total = report.total_selectors,
                    "explicit fill finished"
                );
                FillResponse::from(&report)
            }
            Err(e) => {
                warn!(error = %e, "explicit fill failed");
                FillResponse::failed(e.to_string())
            }
        }
    }

    async fn selectors(&self) -> Vec<SelectorCandidate> {
        match self.document.text_inputs().await {
            Ok(inputs) => candidates(&inputs),
            Err(e) => {
                warn!(error = %e, "listing page inputs failed");
                Vec::new()
            }
        }
    }
}
