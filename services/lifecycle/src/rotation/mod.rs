//! Secret rotation.
//!
//! A rotation is the only in-place mutation of a secret:
//! decrypt → compute → encrypt → persist, with an optimistic version check
//! at persist time. Any failure before persist leaves the stored value
//! untouched; a persist conflict fails the losing caller, never silently
//! overwrites.

mod strategy;

pub use strategy::{
    PostgresPasswordStrategy, RotationStrategy, SendgridKeyStrategy, StrategyError, StrategyKind,
    TimestampSuffixStrategy,
};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use lockbox_id::SecretId;
use thiserror::Error;
use tracing::{info, instrument};

use crate::audit::AuditDispatcher;
use crate::crypto::{CryptoError, EncryptionGateway};
use crate::db::DbError;
use crate::metrics::{OperationKind, OperationMetrics};
use crate::stores::SecretStore;

/// Rotation failure taxonomy.
#[derive(Debug, Error)]
pub enum RotationError {
    /// No secret with this id.
    #[error("unknown secret: {0}")]
    UnknownSecret(SecretId),

    /// The secret names a strategy this build does not register.
    #[error("unsupported rotation strategy: {0}")]
    UnsupportedStrategy(String),

    /// Decrypt or encrypt failure. Fatal for this rotation; the secret
    /// remains in its prior, valid state.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The strategy itself failed to produce a new value.
    #[error(transparent)]
    Strategy(#[from] StrategyError),

    /// Another rotation persisted first. The caller may retry against the
    /// new version.
    #[error("concurrent rotation conflict for {0}")]
    Conflict(SecretId),

    /// Store failure.
    #[error(transparent)]
    Store(#[from] DbError),
}

/// Startup-built map from strategy key to implementation. Read-only after
/// construction.
pub struct StrategyRegistry {
    strategies: HashMap<StrategyKind, Box<dyn RotationStrategy>>,
}

impl StrategyRegistry {
    /// Builds the registry with all shipped strategies.
    pub fn with_builtins() -> Self {
        let mut strategies: HashMap<StrategyKind, Box<dyn RotationStrategy>> = HashMap::new();
        strategies.insert(StrategyKind::Default, Box::new(TimestampSuffixStrategy));
        strategies.insert(StrategyKind::Postgres, Box::new(PostgresPasswordStrategy));
        strategies.insert(StrategyKind::Sendgrid, Box::new(SendgridKeyStrategy));
        Self { strategies }
    }

    /// Resolves a secret's strategy key. Unknown keys fail without mutation.
    pub fn resolve(&self, key: &str) -> Result<&dyn RotationStrategy, RotationError> {
        StrategyKind::from_key(key)
            .and_then(|kind| self.strategies.get(&kind))
            .map(|s| s.as_ref())
            .ok_or_else(|| RotationError::UnsupportedStrategy(key.to_string()))
    }
}

/// Result of a successful rotation.
#[derive(Debug, Clone, Copy)]
pub struct RotationOutcome {
    pub secret_id: SecretId,
    /// The version the new encrypted value persisted under.
    pub new_version: i64,
}

/// Executes rotations against a secret store.
pub struct RotationService<S> {
    store: Arc<S>,
    registry: Arc<StrategyRegistry>,
    gateway: EncryptionGateway,
    audit: AuditDispatcher,
    metrics: Arc<OperationMetrics>,
}

impl<S: SecretStore> RotationService<S> {
    pub fn new(
        store: Arc<S>,
        registry: Arc<StrategyRegistry>,
        gateway: EncryptionGateway,
        audit: AuditDispatcher,
        metrics: Arc<OperationMetrics>,
    ) -> Self {
        Self {
            store,
            registry,
            gateway,
            audit,
            metrics,
        }
    }

    /// Rotates one secret's value.
    ///
    /// The new plaintext exists only inside this call; what persists is the
    /// re-encrypted value, guarded by the version the secret was read at.
    #[instrument(skip(self, actor), fields(secret_id = %secret_id))]
    pub async fn rotate(
        &self,
        secret_id: SecretId,
        actor: &str,
    ) -> Result<RotationOutcome, RotationError> {
        let started = Instant::now();

        let secret = self
            .store
            .fetch(secret_id)
            .await?
            .ok_or(RotationError::UnknownSecret(secret_id))?;

        let strategy = self.registry.resolve(&secret.strategy_type)?;

        // Ciphertexts are bound to their secret id via AAD.
        let aad = secret_id.to_string();
        let current = self.gateway.decrypt(&secret.encrypted_value, aad.as_bytes())?;
        let next = strategy.rotate(&current).await?;
        let encrypted = self.gateway.encrypt(&next, aad.as_bytes())?;

        let persisted = self
            .store
            .update_value(secret_id, &encrypted, secret.version)
            .await?;
        if !persisted {
            return Err(RotationError::Conflict(secret_id));
        }

        self.audit.emit("secret.rotated", &secret.secret_key, actor);
        self.metrics.increment(OperationKind::Rotate);
        self.metrics.observe_rotation(started.elapsed());

        let new_version = secret.version + 1;
        info!(
            secret_key = %secret.secret_key,
            strategy = %secret.strategy_type,
            new_version,
            "Rotated secret value"
        );

        Ok(RotationOutcome {
            secret_id,
            new_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_resolves_all_builtin_kinds() {
        let registry = StrategyRegistry::with_builtins();
        for kind in StrategyKind::ALL {
            assert!(registry.resolve(kind.key()).is_ok());
        }
    }

    #[test]
    fn test_registry_rejects_unknown_key() {
        let registry = StrategyRegistry::with_builtins();
        let err = registry.resolve("AWS_IAM").unwrap_err();
        assert!(matches!(
            err,
            RotationError::UnsupportedStrategy(key) if key == "AWS_IAM"
        ));
    }
}
