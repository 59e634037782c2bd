pub mod browser;
pub mod candidates;
pub mod clock;
pub mod config;
pub mod dom;
pub mod element;
pub mod error;
pub mod fill;
pub mod injector;
pub mod matcher;
pub mod messaging;
pub mod model;
pub mod orchestrator;
pub mod page;
pub mod resolver;
pub mod storage;
pub mod store;

pub use browser::AutofillBrowser;
pub use config::{AutofillConfig, BrowserConfig};
pub use dom::{ChangeSource, Document};
pub use error::{Error, Result};
pub use fill::{run_fill_pass, FillFailure, FillReport};
pub use messaging::{MessageHandler, Request, Response};
pub use model::{Account, DomainConfig, SelectorItem, SelectorType, StorageData};
pub use orchestrator::{AutofillOrchestrator, AutofillSession, OrchestratorState};
pub use page::Page;
pub use storage::{JsonFileBackend, MemoryBackend, StorageBackend};
pub use store::CredentialStore;
