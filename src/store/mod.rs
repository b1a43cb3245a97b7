//! Integration Store
//!
//! Read and update access to stored integration records.
//!
//! The store is always privileged: callers are expected to have authorized
//! the user earlier. Errors from the underlying call are propagated as-is;
//! the store never adds its own retry layer.

pub mod graphql;
pub mod mutation;

pub use graphql::{GraphQlIntegrationStore, ADMIN_SECRET_HEADER, ROLE_HEADER};
pub use mutation::{build_update_token_mutation, FieldUpdate, GraphQlRequest, TokenUpdate};

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::core::lock;
use crate::error::{CredentialsResult, NetworkError, NetworkErrorCode};
use crate::types::{expiry_after, IntegrationRecord};

/// Integration record store interface.
#[async_trait]
pub trait IntegrationStore: Send + Sync {
    /// First integration of `user_id` for `resource`, if any.
    async fn get_by_resource(
        &self,
        user_id: &str,
        resource: &str,
    ) -> CredentialsResult<Option<IntegrationRecord>>;

    /// First integration of `user_id` with the given name, if any.
    async fn get_by_name(
        &self,
        user_id: &str,
        name: &str,
    ) -> CredentialsResult<Option<IntegrationRecord>>;

    /// All integrations of `user_id` for `resource`.
    async fn list_by_resource(
        &self,
        user_id: &str,
        resource: &str,
    ) -> CredentialsResult<Vec<IntegrationRecord>>;

    /// All integrations of `user_id` for `resource` and `client_type`.
    async fn list_by_resource_and_client_type(
        &self,
        user_id: &str,
        resource: &str,
        client_type: &str,
    ) -> CredentialsResult<Vec<IntegrationRecord>>;

    /// Apply a sparse update to the credential columns of integration `id`.
    async fn update_token(&self, id: &str, update: &TokenUpdate) -> CredentialsResult<()>;
}

/// In-memory store for testing.
///
/// Updates are recorded and applied to the held records, last writer wins.
#[derive(Default)]
pub struct MockIntegrationStore {
    records: Mutex<Vec<IntegrationRecord>>,
    updates: Mutex<Vec<(String, TokenUpdate)>>,
    update_error: Mutex<Option<NetworkErrorCode>>,
    lookup_count: AtomicU32,
}

impl MockIntegrationStore {
    /// Create new mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record.
    pub fn insert(&self, record: IntegrationRecord) -> &Self {
        lock(&self.records).push(record);
        self
    }

    /// Make every update fail with the given network code.
    pub fn fail_updates_with(&self, code: NetworkErrorCode) -> &Self {
        *lock(&self.update_error) = Some(code);
        self
    }

    /// Updates received so far, in order.
    pub fn get_updates(&self) -> Vec<(String, TokenUpdate)> {
        lock(&self.updates).clone()
    }

    /// Current state of a record.
    pub fn get_record(&self, id: &str) -> Option<IntegrationRecord> {
        lock(&self.records).iter().find(|r| r.id == id).cloned()
    }

    /// Number of lookups performed.
    pub fn get_lookup_count(&self) -> u32 {
        self.lookup_count.load(Ordering::SeqCst)
    }

    fn find(&self, predicate: impl Fn(&IntegrationRecord) -> bool) -> Vec<IntegrationRecord> {
        self.lookup_count.fetch_add(1, Ordering::SeqCst);
        lock(&self.records)
            .iter()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl IntegrationStore for MockIntegrationStore {
    async fn get_by_resource(
        &self,
        user_id: &str,
        resource: &str,
    ) -> CredentialsResult<Option<IntegrationRecord>> {
        Ok(self
            .find(|r| r.user_id == user_id && r.resource.as_deref() == Some(resource))
            .into_iter()
            .next())
    }

    async fn get_by_name(
        &self,
        user_id: &str,
        name: &str,
    ) -> CredentialsResult<Option<IntegrationRecord>> {
        Ok(self
            .find(|r| r.user_id == user_id && r.name.as_deref() == Some(name))
            .into_iter()
            .next())
    }

    async fn list_by_resource(
        &self,
        user_id: &str,
        resource: &str,
    ) -> CredentialsResult<Vec<IntegrationRecord>> {
        Ok(self.find(|r| r.user_id == user_id && r.resource.as_deref() == Some(resource)))
    }

    async fn list_by_resource_and_client_type(
        &self,
        user_id: &str,
        resource: &str,
        client_type: &str,
    ) -> CredentialsResult<Vec<IntegrationRecord>> {
        Ok(self.find(|r| {
            r.user_id == user_id
                && r.resource.as_deref() == Some(resource)
                && r.client_type.as_deref() == Some(client_type)
        }))
    }

    async fn update_token(&self, id: &str, update: &TokenUpdate) -> CredentialsResult<()> {
        lock(&self.updates).push((id.to_string(), update.clone()));

        if let Some(code) = lock(&self.update_error).clone() {
            return Err(NetworkError::new(Some(code), "mock update failure").into());
        }

        let now = Utc::now();
        let expires_at = match update.expires_in {
            FieldUpdate::Unchanged => FieldUpdate::Unchanged,
            FieldUpdate::Clear => FieldUpdate::Clear,
            FieldUpdate::Set(secs) => FieldUpdate::Set(expiry_after(now, secs)?),
        };

        let mut records = lock(&self.records);
        if let Some(record) = records.iter_mut().find(|r| r.id == id) {
            apply(&mut record.token, &update.token);
            apply(&mut record.refresh_token, &update.refresh_token);
            apply(&mut record.expires_at, &expires_at);
            if let Some(enabled) = update.enabled {
                record.enabled = Some(enabled);
            }
            record.updated_at = Some(now);
        }
        Ok(())
    }
}

fn apply<T: Clone>(column: &mut Option<T>, update: &FieldUpdate<T>) {
    match update {
        FieldUpdate::Unchanged => {}
        FieldUpdate::Clear => *column = None,
        FieldUpdate::Set(value) => *column = Some(value.clone()),
    }
}

/// Create mock store for testing.
pub fn create_mock_store() -> MockIntegrationStore {
    MockIntegrationStore::new()
}
