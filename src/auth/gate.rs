use std::sync::Arc;

use crate::auth::{keys, password, AuthError};
use crate::store::{Identity, Store};

/// Resolves presented credentials to a stored identity.
pub struct AuthGate {
    store: Arc<dyn Store>,
}

impl AuthGate {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Resolve a bearer API key to its identity.
    ///
    /// The presented key is hashed, the identity is looked up by that hash,
    /// and the hashes are then compared in constant time. Unknown keys and
    /// disabled identities are expected outcomes, not faults.
    pub async fn authenticate(&self, presented_key: &str) -> Result<Identity, AuthError> {
        let presented_hash = keys::hash_api_key(presented_key);

        let identity = self
            .store
            .find_identity_by_key_hash(&presented_hash)
            .await?
            .ok_or(AuthError::UnknownKey)?;

        if !keys::hashes_match(&presented_hash, &identity.key_hash) {
            return Err(AuthError::UnknownKey);
        }
        if !identity.is_active {
            return Err(AuthError::InactiveIdentity);
        }

        Ok(identity)
    }

    /// Verify an email/password pair for login.
    pub async fn login(&self, email: &str, presented_password: &str) -> Result<Identity, AuthError> {
        let identity = self
            .store
            .find_identity_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let matches = password::verify_password(presented_password, &identity.password_hash)
            .map_err(|e| AuthError::Hash(e.to_string()))?;
        if !matches {
            return Err(AuthError::InvalidCredentials);
        }
        if !identity.is_active {
            return Err(AuthError::InactiveIdentity);
        }

        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use uuid::Uuid;

    use crate::store::{NewIdentity, StoreError, UsageRecord, UsageStats};

    struct FixedStore {
        identities: Vec<Identity>,
    }

    #[async_trait]
    impl Store for FixedStore {
        async fn create_identity(&self, _new: NewIdentity) -> Result<Identity, StoreError> {
            unimplemented!()
        }

        async fn find_identity_by_key_hash(
            &self,
            key_hash: &str,
        ) -> Result<Option<Identity>, StoreError> {
            Ok(self
                .identities
                .iter()
                .find(|i| i.key_hash == key_hash)
                .cloned())
        }

        async fn find_identity_by_email(
            &self,
            email: &str,
        ) -> Result<Option<Identity>, StoreError> {
            Ok(self.identities.iter().find(|i| i.email == email).cloned())
        }

        async fn rotate_key_hash(
            &self,
            _identity_id: Uuid,
            _key_hash: &str,
        ) -> Result<(), StoreError> {
            unimplemented!()
        }

        async fn append_usage(&self, _record: UsageRecord) -> Result<(), StoreError> {
            unimplemented!()
        }

        async fn usage_stats(
            &self,
            _identity_id: Uuid,
            _days: i64,
        ) -> Result<UsageStats, StoreError> {
            unimplemented!()
        }
    }

    fn identity_with(key_hash: &str, password_hash: &str, is_active: bool) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: "ada@example.com".into(),
            username: "ada".into(),
            password_hash: password_hash.into(),
            key_hash: key_hash.into(),
            is_active,
        }
    }

    fn gate_with(identities: Vec<Identity>) -> AuthGate {
        AuthGate::new(Arc::new(FixedStore { identities }))
    }

    #[tokio::test]
    async fn test_authenticate_known_key() {
        let (key, hash) = keys::generate_api_key();
        let stored = identity_with(&hash, "", true);
        let gate = gate_with(vec![stored.clone()]);

        let resolved = gate.authenticate(&key).await.unwrap();
        assert_eq!(resolved.id, stored.id);
        assert_eq!(resolved.username, stored.username);
    }

    #[tokio::test]
    async fn test_authenticate_unknown_key() {
        let (_, hash) = keys::generate_api_key();
        let gate = gate_with(vec![identity_with(&hash, "", true)]);

        let (other_key, _) = keys::generate_api_key();
        let err = gate.authenticate(&other_key).await.unwrap_err();
        assert!(matches!(err, AuthError::UnknownKey));
    }

    #[tokio::test]
    async fn test_authenticate_inactive_identity() {
        let (key, hash) = keys::generate_api_key();
        let gate = gate_with(vec![identity_with(&hash, "", false)]);

        let err = gate.authenticate(&key).await.unwrap_err();
        assert!(matches!(err, AuthError::InactiveIdentity));
    }

    #[tokio::test]
    async fn test_login_verifies_password() {
        let password_hash = password::hash_password("hunter2").unwrap();
        let stored = identity_with("", &password_hash, true);
        let gate = gate_with(vec![stored.clone()]);

        let resolved = gate.login("ada@example.com", "hunter2").await.unwrap();
        assert_eq!(resolved.id, stored.id);

        let err = gate.login("ada@example.com", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_login_unknown_email() {
        let gate = gate_with(vec![]);
        let err = gate.login("nobody@example.com", "pw").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }
}
