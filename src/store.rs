use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, info};

use crate::config::{AutofillConfig, DEFAULT_STORAGE_KEY};
use crate::error::{Error, Result};
use crate::matcher;
use crate::model::{ids_overlap, now_millis, Account, DomainConfig, DomainWithAccounts, StorageData};
use crate::storage::StorageBackend;

/// Parent config id → positions of its accounts in the snapshot, in storage order.
#[derive(Debug, Default)]
pub struct AccountIndex {
    by_parent: HashMap<String, Vec<usize>>,
}

impl AccountIndex {
    pub fn build(data: &StorageData) -> Self {
        let mut by_parent: HashMap<String, Vec<usize>> = HashMap::new();
        for (pos, account) in data.accounts.iter().enumerate() {
            if let Some(parent) = &account.parent_id {
                by_parent.entry(parent.clone()).or_default().push(pos);
            }
        }
        Self { by_parent }
    }

    pub fn children(&self, parent_id: &str) -> &[usize] {
        self.by_parent.get(parent_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn accounts<'a>(&self, data: &'a StorageData, parent_id: &str) -> Vec<&'a Account> {
        self.children(parent_id)
            .iter()
            .map(|&pos| &data.accounts[pos])
            .collect()
    }
}

/// Owns the persisted snapshot and enforces the data model's invariants.
///
/// Every mutation is a read-modify-write of the whole snapshot. There is no
/// locking across writers, so two concurrent saves can lose one update.
pub struct CredentialStore<B> {
    backend: B,
    key: String,
}

impl<B: StorageBackend> CredentialStore<B> {
    pub fn new(backend: B) -> Self {
        Self::with_key(backend, DEFAULT_STORAGE_KEY)
    }

    pub fn with_key(backend: B, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    /// Store under the namespace key of an [`AutofillConfig`].
    pub fn for_config(backend: B, config: &AutofillConfig) -> Self {
        Self::with_key(backend, config.storage_key.clone())
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    async fn load(&self) -> Result<StorageData> {
        let mut data = match self.backend.get(&self.key).await? {
            None | Some(Value::Null) => StorageData::default(),
            Some(value) => serde_json::from_value(value)?,
        };
        data.normalize();
        Ok(data)
    }

    async fn persist(&self, data: &StorageData) -> Result<()> {
        let value = serde_json::to_value(data)?;
        self.backend.set(&self.key, value).await?;
        debug!(
            configs = data.domain_configs.len(),
            accounts = data.accounts.len(),
            "snapshot persisted"
        );
        Ok(())
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub async fn get_all_domain_configs(&self) -> Result<Vec<DomainConfig>> {
        Ok(self.load().await?.domain_configs)
    }

    pub async fn get_all_accounts(&self) -> Result<Vec<Account>> {
        Ok(self.load().await?.accounts)
    }

    /// Accounts owned by a domain config, in storage order.
    pub async fn get_accounts_by_domain_config_id(&self, id: &str) -> Result<Vec<Account>> {
        let data = self.load().await?;
        let index = AccountIndex::build(&data);
        Ok(index.accounts(&data, id).into_iter().cloned().collect())
    }

    /// The flagged default account of a config, else its first account.
    pub async fn get_default_account(&self, domain_config_id: &str) -> Result<Option<Account>> {
        let owned = self.get_accounts_by_domain_config_id(domain_config_id).await?;
        let default = owned.iter().position(|a| a.is_default).unwrap_or(0);
        Ok(owned.into_iter().nth(default))
    }

    /// First config in storage order whose domain pattern matches `hostname`.
    pub async fn find_by_domain(&self, hostname: &str) -> Result<Option<DomainConfig>> {
        let configs = self.get_all_domain_configs().await?;
        Ok(matcher::find_by_domain(&configs, hostname).cloned())
    }

    /// Number of accounts available on a host; zero when no config matches.
    pub async fn count_accounts_for_host(&self, hostname: &str) -> Result<usize> {
        let data = self.load().await?;
        let Some(config) = matcher::find_by_domain(&data.domain_configs, hostname) else {
            return Ok(0);
        };
        Ok(AccountIndex::build(&data).children(&config.id).len())
    }

    pub async fn get_domains_with_accounts(&self) -> Result<Vec<DomainWithAccounts>> {
        let data = self.load().await?;
        let index = AccountIndex::build(&data);
        Ok(data
            .domain_configs
            .iter()
            .map(|config| DomainWithAccounts {
                config: config.clone(),
                accounts: index.accounts(&data, &config.id).into_iter().cloned().collect(),
            })
            .collect())
    }

    // ── Mutations ───────────────────────────────────────────────────

    /// Insert or update a domain config by id.
    pub async fn save_domain_config(&self, mut config: DomainConfig) -> Result<DomainConfig> {
        let mut data = self.load().await?;

        if let Some(other) = data.domain_configs.iter().find(|c| ids_overlap(&c.id, &config.id)) {
            return Err(Error::IdCollision(format!(
                "domain config id {:?} overlaps {:?}",
                config.id, other.id
            )));
        }

        let now = now_millis();
        config.updated_at = now;
        match data.domain_configs.iter_mut().find(|c| c.id == config.id) {
            Some(existing) => {
                config.created_at = existing.created_at;
                *existing = config.clone();
                info!(id = %config.id, domain = %config.domain, "domain config updated");
            }
            None => {
                config.created_at = now;
                data.domain_configs.push(config.clone());
                info!(id = %config.id, domain = %config.domain, "domain config created");
            }
        }

        self.persist(&data).await?;
        Ok(config)
    }

    /// Insert or update an account by id. Saving a default account clears the
    /// default flag on its siblings in the same write.
    pub async fn save_account(&self, mut account: Account) -> Result<Account> {
        let mut data = self.load().await?;

        let parent = match account.parent_id.take() {
            Some(parent) => parent,
            None => data
                .derive_parent(&account.id)
                .ok_or_else(|| Error::OrphanAccount(account.id.clone()))?,
        };
        if !data.domain_configs.iter().any(|c| c.id == parent) {
            return Err(Error::OrphanAccount(account.id.clone()));
        }
        if !account.id_matches_parent(&parent) {
            return Err(Error::IdCollision(format!(
                "account id {:?} does not start with its parent {:?}",
                account.id, parent
            )));
        }
        account.parent_id = Some(parent.clone());

        let now = now_millis();
        account.updated_at = now;
        match data.accounts.iter_mut().find(|a| a.id == account.id) {
            Some(existing) => {
                account.created_at = existing.created_at;
                *existing = account.clone();
            }
            None => {
                account.created_at = now;
                data.accounts.push(account.clone());
            }
        }

        if account.is_default {
            for sibling in data
                .accounts
                .iter_mut()
                .filter(|a| a.is_owned_by(&parent) && a.id != account.id)
            {
                sibling.is_default = false;
            }
        }

        info!(id = %account.id, parent = %parent, default = account.is_default, "account saved");
        self.persist(&data).await?;
        Ok(account)
    }

    /// Remove a domain config and every account it owns or whose id carries
    /// its prefix.
    pub async fn delete_domain_config(&self, id: &str) -> Result<()> {
        let mut data = self.load().await?;
        data.domain_configs.retain(|c| c.id != id);
        let before = data.accounts.len();
        data.accounts
            .retain(|a| !a.is_owned_by(id) && !a.id_matches_parent(id));
        info!(id, removed_accounts = before - data.accounts.len(), "domain config deleted");
        self.persist(&data).await
    }

    /// Remove one account. `default_account_id` pointers are left as they are.
    pub async fn delete_account(&self, id: &str) -> Result<()> {
        let mut data = self.load().await?;
        data.accounts.retain(|a| a.id != id);
        info!(id, "account deleted");
        self.persist(&data).await
    }

    // ── Snapshot ────────────────────────────────────────────────────

    pub async fn export_storage_data(&self) -> Result<StorageData> {
        self.load().await
    }

    /// Replace the whole snapshot. Validation happens before anything is
    /// written, so a rejected import leaves the stored snapshot untouched.
    pub async fn import_storage_data(&self, value: Value) -> Result<()> {
        let data = validate_snapshot(value)?;
        info!(
            configs = data.domain_configs.len(),
            accounts = data.accounts.len(),
            "snapshot imported"
        );
        self.persist(&data).await
    }
}

fn validate_snapshot(value: Value) -> Result<StorageData> {
    let Some(object) = value.as_object() else {
        return Err(Error::MalformedSnapshot("snapshot must be a JSON object".into()));
    };
    for field in ["domainConfigs", "accounts"] {
        match object.get(field) {
            None => return Err(Error::MalformedSnapshot(format!("missing `{field}`"))),
            Some(Value::Array(_)) => {}
            Some(_) => return Err(Error::MalformedSnapshot(format!("`{field}` must be an array"))),
        }
    }
    let mut data: StorageData =
        serde_json::from_value(value).map_err(|e| Error::MalformedSnapshot(e.to_string()))?;
    data.normalize();
    check_ownership(&data)?;
    Ok(data)
}

/// Config ids must not overlap as prefixes, and every account must belong to
/// an existing config whose id prefixes its own.
fn check_ownership(data: &StorageData) -> Result<()> {
    for (i, config) in data.domain_configs.iter().enumerate() {
        if let Some(other) = data.domain_configs[i + 1..]
            .iter()
            .find(|c| c.id == config.id || ids_overlap(&c.id, &config.id))
        {
            return Err(Error::MalformedSnapshot(format!(
                "domain config ids {:?} and {:?} collide",
                config.id, other.id
            )));
        }
    }
    for account in &data.accounts {
        let Some(parent) = &account.parent_id else {
            return Err(Error::MalformedSnapshot(format!(
                "account {:?} has no owning domain config",
                account.id
            )));
        };
        if !data.domain_configs.iter().any(|c| &c.id == parent) {
            return Err(Error::MalformedSnapshot(format!(
                "account {:?} names missing domain config {:?}",
                account.id, parent
            )));
        }
        if !account.id_matches_parent(parent) {
            return Err(Error::MalformedSnapshot(format!(
                "account {:?} does not start with its parent {:?}",
                account.id, parent
            )));
        }
    }
    Ok(())
}
