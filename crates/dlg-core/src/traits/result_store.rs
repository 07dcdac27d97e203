//! Connection result store

use dashmap::DashMap;

use crate::types::{ConnectionResult, DelegateId};

/// Keyed store of validation results.
///
/// Results are unique per `(account_id, delegate_id, criteria)`; a new
/// attempt replaces the previous record for the same key.
pub trait ConnectionResultStore: Send + Sync {
    /// Insert or replace a result
    fn upsert(&self, result: ConnectionResult);

    /// Fetch the latest result for a key
    fn get(&self, account_id: &str, delegate_id: &DelegateId, criteria: &str)
        -> Option<ConnectionResult>;

    /// All results recorded for one delegate
    fn list_for_delegate(&self, account_id: &str, delegate_id: &DelegateId)
        -> Vec<ConnectionResult>;

    /// Whether the delegate has a validated result for any of the criteria
    fn any_validated(&self, account_id: &str, delegate_id: &DelegateId, criteria: &[String]) -> bool {
        criteria.iter().any(|c| {
            self.get(account_id, delegate_id, c)
                .map(|r| r.validated)
                .unwrap_or(false)
        })
    }
}

type ResultKey = (String, DelegateId, String);

/// In-memory result store backed by a concurrent map
#[derive(Debug, Default)]
pub struct InMemoryResultStore {
    results: DashMap<ResultKey, ConnectionResult>,
}

impl InMemoryResultStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            results: DashMap::new(),
        }
    }

    /// Number of stored results
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl ConnectionResultStore for InMemoryResultStore {
    fn upsert(&self, result: ConnectionResult) {
        self.results.insert(result.key(), result);
    }

    fn get(
        &self,
        account_id: &str,
        delegate_id: &DelegateId,
        criteria: &str,
    ) -> Option<ConnectionResult> {
        let key = (
            account_id.to_string(),
            delegate_id.clone(),
            criteria.to_string(),
        );
        self.results.get(&key).map(|r| r.value().clone())
    }

    fn list_for_delegate(
        &self,
        account_id: &str,
        delegate_id: &DelegateId,
    ) -> Vec<ConnectionResult> {
        self.results
            .iter()
            .filter(|r| r.account_id == account_id && &r.delegate_id == delegate_id)
            .map(|r| r.value().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(criteria: &str, validated: bool) -> ConnectionResult {
        ConnectionResult {
            account_id: "acc".to_string(),
            delegate_id: DelegateId::new("dlg-1"),
            criteria: criteria.to_string(),
            validated,
            duration: 5,
        }
    }

    #[test]
    fn test_upsert_replaces_same_key() {
        let store = InMemoryResultStore::new();
        store.upsert(result("https://reg.example.com", false));
        store.upsert(result("https://reg.example.com", true));

        assert_eq!(store.len(), 1);
        let stored = store
            .get("acc", &DelegateId::new("dlg-1"), "https://reg.example.com")
            .unwrap();
        assert!(stored.validated);
    }

    #[test]
    fn test_keys_are_scoped_by_delegate() {
        let store = InMemoryResultStore::new();
        store.upsert(result("AWS:us-east-1", true));
        let mut other = result("AWS:us-east-1", false);
        other.delegate_id = DelegateId::new("dlg-2");
        store.upsert(other);

        assert_eq!(store.len(), 2);
        assert_eq!(
            store
                .list_for_delegate("acc", &DelegateId::new("dlg-2"))
                .len(),
            1
        );
        assert!(store.any_validated(
            "acc",
            &DelegateId::new("dlg-1"),
            &["AWS:us-east-1".to_string()]
        ));
        assert!(!store.any_validated(
            "acc",
            &DelegateId::new("dlg-2"),
            &["AWS:us-east-1".to_string()]
        ));
    }
}
