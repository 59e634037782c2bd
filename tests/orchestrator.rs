mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{login_page, seed_login, FakeChanges, FakeDocument, FakeElement, PASS_XPATH, USER_CSS};
use domain_autofill::dom::ChangeBatch;
use domain_autofill::{Account, AutofillConfig, AutofillOrchestrator, FillFailure, OrchestratorState};
use futures::channel::mpsc;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_fills_on_first_attempt() {
    let seeded = seed_login("example.com").await;
    let (doc, user, _) = login_page("example.com");
    let mut orch = AutofillOrchestrator::new(seeded.store.clone(), doc.clone(), AutofillConfig::default());
    assert_eq!(orch.state(), OrchestratorState::Idle);

    let started = Instant::now();
    assert!(orch.start().await.unwrap());

    assert_eq!(orch.state(), OrchestratorState::Filled);
    assert_eq!(orch.passes_run(), 1);
    assert_eq!(started.elapsed(), Duration::from_millis(800));
    assert_eq!(doc.element(user).value, "alice");
    assert_eq!(orch.last_report().unwrap().filled_count, 2);
}

#[tokio::test(start_paused = true)]
async fn test_retry_ceiling_then_waits_for_changes() {
    let seeded = seed_login("example.com").await;
    let doc = Arc::new(FakeDocument::new("example.com"));
    let mut orch = AutofillOrchestrator::new(seeded.store.clone(), doc.clone(), AutofillConfig::default());

    let started = Instant::now();
    assert!(!orch.start().await.unwrap());

    assert_eq!(orch.passes_run(), 3);
    assert_eq!(orch.state(), OrchestratorState::Observing);
    // settle + two retry delays
    assert_eq!(started.elapsed(), Duration::from_millis(1800));
    assert_eq!(orch.last_report().unwrap().failure, Some(FillFailure::NothingFilled));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(orch.passes_run(), 3);

    // A second start does not re-run the initial attempts.
    assert!(!orch.start().await.unwrap());
    assert_eq!(orch.passes_run(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_configured_attempts_and_delay() {
    let seeded = seed_login("example.com").await;
    let doc = Arc::new(FakeDocument::new("example.com"));
    let config = AutofillConfig::default()
        .max_attempts(5)
        .retry_delay(Duration::from_millis(200))
        .settle_delay(Duration::ZERO);
    let mut orch = AutofillOrchestrator::new(seeded.store.clone(), doc, config);

    let started = Instant::now();
    orch.start().await.unwrap();

    assert_eq!(orch.passes_run(), 5);
    assert_eq!(started.elapsed(), Duration::from_millis(800));
}

#[tokio::test(start_paused = true)]
async fn test_form_rendered_between_attempts() {
    let seeded = seed_login("example.com").await;
    let doc = Arc::new(FakeDocument::new("example.com"));
    let mut orch = AutofillOrchestrator::new(seeded.store.clone(), doc.clone(), AutofillConfig::default());

    let late = doc.clone();
    let render = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        late.add(Some(USER_CSS), None, FakeElement::input())
    });

    assert!(orch.start().await.unwrap());
    let user = render.await.unwrap();

    // First pass at 800ms found nothing, the retry at 1300ms filled.
    assert_eq!(orch.passes_run(), 2);
    assert_eq!(doc.element(user).value, "alice");
}

#[tokio::test(start_paused = true)]
async fn test_precondition_failure_is_not_retried() {
    let seeded = seed_login("example.com").await;
    seeded
        .store
        .save_account(Account { auto_fill: false, ..seeded.account.clone() })
        .await
        .unwrap();
    let (doc, _, _) = login_page("example.com");
    let mut orch = AutofillOrchestrator::new(seeded.store.clone(), doc, AutofillConfig::default());

    assert!(!orch.start().await.unwrap());

    assert_eq!(orch.passes_run(), 1);
    assert_eq!(orch.state(), OrchestratorState::Observing);
    assert_eq!(orch.last_report().unwrap().failure, Some(FillFailure::AccountUnavailable));
}

#[tokio::test(start_paused = true)]
async fn test_change_cooldown_and_single_success() {
    let seeded = seed_login("example.com").await;
    let doc = Arc::new(FakeDocument::new("example.com"));
    let mut orch = AutofillOrchestrator::new(seeded.store.clone(), doc.clone(), AutofillConfig::default());
    orch.start().await.unwrap();
    assert_eq!(orch.passes_run(), 3);

    // First change always qualifies; the pass runs after the debounce.
    let before = Instant::now();
    let report = orch.on_change().await.unwrap();
    assert_eq!(before.elapsed(), Duration::from_millis(1000));
    assert_eq!(report.failure, Some(FillFailure::NothingFilled));
    assert_eq!(orch.passes_run(), 4);

    // One second after the trigger: inside the cooldown.
    assert!(orch.on_change().await.is_none());
    assert_eq!(orch.passes_run(), 4);

    // Three seconds after the trigger: qualifies again.
    let user = doc.add(Some(USER_CSS), None, FakeElement::input());
    tokio::time::advance(Duration::from_millis(2000)).await;
    let report = orch.on_change().await.unwrap();
    assert!(report.is_success());
    assert_eq!(orch.state(), OrchestratorState::Filled);
    assert_eq!(orch.passes_run(), 5);
    assert_eq!(doc.element(user).value, "alice");

    // Filled is final, even when new fields show up later.
    let pass_field = doc.add(None, Some(PASS_XPATH), FakeElement::input());
    tokio::time::advance(Duration::from_secs(10)).await;
    assert!(orch.on_change().await.is_none());
    assert_eq!(orch.passes_run(), 5);
    assert_eq!(doc.element(pass_field).value, "");
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_changes_triggers_one_pass() {
    let seeded = seed_login("example.com").await;
    let doc = Arc::new(FakeDocument::new("example.com"));
    let mut orch = AutofillOrchestrator::new(seeded.store.clone(), doc, AutofillConfig::default());
    orch.start().await.unwrap();

    let (tx, rx) = mpsc::unbounded();
    for records in 1..=5 {
        tx.unbounded_send(ChangeBatch { records }).unwrap();
    }
    drop(tx);

    orch.observe(rx).await;

    assert_eq!(orch.passes_run(), 4);
    assert_eq!(orch.state(), OrchestratorState::Exhausted);
}

#[tokio::test(start_paused = true)]
async fn test_run_fills_after_late_render_and_unsubscribes() {
    let seeded = seed_login("example.com").await;
    let doc = Arc::new(FakeDocument::new("example.com"));
    let (tx, rx) = mpsc::unbounded();
    let changes = FakeChanges::new(rx);
    let mut orch = AutofillOrchestrator::new(seeded.store.clone(), doc.clone(), AutofillConfig::default());

    let page = doc.clone();
    let sender = tx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        page.add(Some(USER_CSS), None, FakeElement::input());
        let _ = sender.unbounded_send(ChangeBatch { records: 3 });
    });

    let state = orch.run(&changes).await.unwrap();

    assert_eq!(state, OrchestratorState::Filled);
    assert!(changes.subscribed());
    assert_eq!(orch.passes_run(), 4);
    // The stream was dropped when the page got filled.
    assert!(tx.unbounded_send(ChangeBatch::default()).is_err());
}

#[tokio::test(start_paused = true)]
async fn test_run_skips_subscription_when_filled_early() {
    let seeded = seed_login("example.com").await;
    let (doc, _, _) = login_page("example.com");
    let (_tx, rx) = mpsc::unbounded();
    let changes = FakeChanges::new(rx);
    let mut orch = AutofillOrchestrator::new(seeded.store.clone(), doc, AutofillConfig::default());

    let state = orch.run(&changes).await.unwrap();

    assert_eq!(state, OrchestratorState::Filled);
    assert!(!changes.subscribed());
}

#[tokio::test(start_paused = true)]
async fn test_spawned_session_fills_late_page() {
    let seeded = seed_login("example.com").await;
    let doc = Arc::new(FakeDocument::new("example.com"));
    let (tx, rx) = mpsc::unbounded();
    let changes = Arc::new(FakeChanges::new(rx));
    let orch = AutofillOrchestrator::new(seeded.store.clone(), doc.clone(), AutofillConfig::default());

    let session = orch.spawn(changes.clone());
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(!session.is_finished());

    // The page stays reachable while the flow waits.
    let user = session.document().add(Some(USER_CSS), None, FakeElement::input());
    tx.unbounded_send(ChangeBatch { records: 1 }).unwrap();

    assert_eq!(session.wait().await.unwrap(), OrchestratorState::Filled);
    assert_eq!(doc.element(user).value, "alice");
}

#[tokio::test(start_paused = true)]
async fn test_stopped_session_releases_subscription() {
    let seeded = seed_login("example.com").await;
    let doc = Arc::new(FakeDocument::new("example.com"));
    let (tx, rx) = mpsc::unbounded();
    let changes = Arc::new(FakeChanges::new(rx));
    let orch = AutofillOrchestrator::new(seeded.store.clone(), doc.clone(), AutofillConfig::default());

    let session = orch.spawn(changes.clone());
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(changes.subscribed());

    let page = session.stop();
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert!(Arc::ptr_eq(&page, &doc));
    assert!(tx.unbounded_send(ChangeBatch::default()).is_err());
}
