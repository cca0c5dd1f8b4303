//! Hot-swappable authorization snapshot.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tracing::{debug, trace};

use super::error::AuthError;
use super::list::AuthorizationList;

/// Authorization decisions for the HTTP layer
pub trait Authorizer: Send + Sync {
    /// May `requester` fetch material for `resource`?
    fn authorize_hostname(&self, resource: &str, requester: &str) -> Result<bool, AuthError>;

    /// Names of every resource `requester` may fetch, in list order
    fn available_domains(&self, requester: &str) -> Result<Vec<String>, AuthError>;

    /// Whether a list has been loaded
    fn is_ready(&self) -> bool;
}

/// Current authorization list, replaced atomically on refresh
///
/// Readers work on a snapshot: a swap never affects a lookup already in
/// progress.
#[derive(Debug, Default)]
pub struct AuthorizationStore {
    current: ArcSwapOption<AuthorizationList>,
}

impl AuthorizationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new list
    pub fn swap(&self, list: AuthorizationList) {
        let entries = list.len();
        let previous = self.current.swap(Some(Arc::new(list)));
        debug!(
            entries,
            replaced = previous.is_some(),
            "Authorization list swapped"
        );
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Result<Arc<AuthorizationList>, AuthError> {
        self.current.load_full().ok_or(AuthError::NotReady)
    }
}

impl Authorizer for AuthorizationStore {
    fn authorize_hostname(&self, resource: &str, requester: &str) -> Result<bool, AuthError> {
        let list = self.snapshot()?;
        let allowed = list
            .get(resource)
            .map(|entry| entry.is_allowed(requester))
            .unwrap_or(false);
        trace!(resource = %resource, requester = %requester, allowed, "Authorization check");
        Ok(allowed)
    }

    fn available_domains(&self, requester: &str) -> Result<Vec<String>, AuthError> {
        let list = self.snapshot()?;
        Ok(list
            .entries()
            .iter()
            .filter(|e| e.is_allowed(requester))
            .map(|e| e.name.clone())
            .collect())
    }

    fn is_ready(&self) -> bool {
        self.current.load().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(yaml: &str) -> AuthorizationList {
        AuthorizationList::from_yaml(yaml.as_bytes()).unwrap()
    }

    #[test]
    fn test_not_ready_before_first_swap() {
        let store = AuthorizationStore::new();
        assert!(!store.is_ready());
        assert!(matches!(
            store.authorize_hostname("a.com", "h"),
            Err(AuthError::NotReady)
        ));
        assert!(matches!(store.available_domains("h"), Err(AuthError::NotReady)));
    }

    #[test]
    fn test_authorize_and_list_in_order() {
        let store = AuthorizationStore::new();
        store.swap(list(
            r#"
authorization_list:
  - name: z.com
    allow: h1,h2
  - name: a.com
    allow: h1
  - name: m.com
    allow: h3
"#,
        ));

        assert!(store.is_ready());
        assert!(store.authorize_hostname("z.com", "h2").unwrap());
        assert!(!store.authorize_hostname("m.com", "h1").unwrap());
        assert!(!store.authorize_hostname("unknown.com", "h1").unwrap());
        assert_eq!(store.available_domains("h1").unwrap(), vec!["z.com", "a.com"]);
        assert!(store.available_domains("nobody").unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_survives_swap() {
        let store = AuthorizationStore::new();
        store.swap(list("authorization_list:\n  - name: old.com\n"));
        let held = store.snapshot().unwrap();

        store.swap(list("authorization_list:\n  - name: new.com\n"));
        assert!(held.get("old.com").is_some());
        assert!(store.authorize_hostname("new.com", "new.com").unwrap());
        assert!(!store.authorize_hostname("old.com", "old.com").unwrap());
    }
}
