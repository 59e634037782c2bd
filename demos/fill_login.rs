//! Opens a page and lets the engine fill it from a JSON credential file.
//!
//! ```text
//! cargo run --example fill_login -- https://login.example.com ./autofill.json
//! ```
//!
//! The file is created with a sample entry for the page's host when it holds
//! no configuration yet. Set `RUST_LOG=domain_autofill=debug` to follow each pass.

use std::sync::Arc;
use std::time::Duration;

use domain_autofill::dom::Document;
use domain_autofill::{
    Account, AutofillBrowser, AutofillConfig, AutofillOrchestrator, CredentialStore, DomainConfig,
    JsonFileBackend, SelectorItem, SelectorType,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> domain_autofill::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let url = args.next().unwrap_or_else(|| "https://httpbin.org/forms/post".to_string());
    let data_path = args.next().unwrap_or_else(|| "autofill.json".to_string());

    let config = AutofillConfig::default().cooldown(Duration::from_secs(2));
    let store = Arc::new(CredentialStore::for_config(JsonFileBackend::new(&data_path), &config));

    let browser = AutofillBrowser::builder().headless(false).build().await?;
    let page = Arc::new(browser.new_page(&url).await?);

    let host = page.hostname().await?;
    if store.find_by_domain(&host).await?.is_none() {
        let name = SelectorItem::new("input[name='custname']", SelectorType::Css).with_alias("name");
        let email = SelectorItem::new("//input[@name='custemail']", SelectorType::Xpath).with_alias("email");
        let domain = store
            .save_domain_config(
                DomainConfig::new(&host)
                    .with_selector(name.clone())
                    .with_selector(email.clone()),
            )
            .await?;
        store
            .save_account(
                Account::new(&domain.id, "sample")
                    .with_value(&name.id, "Agent Browser")
                    .with_value(&email.id, "agent@example.com"),
            )
            .await?;
        println!("Saved a sample entry for {host} to {data_path}");
    }

    let mut orchestrator = AutofillOrchestrator::new(store, page.clone(), config);
    let state = orchestrator.run(page.as_ref()).await?;
    println!(
        "{}: finished in state {state:?} after {} passes",
        page.url().await?,
        orchestrator.passes_run()
    );

    browser.close().await
}
