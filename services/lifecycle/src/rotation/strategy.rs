//! Rotation strategies.
//!
//! A strategy derives a new plaintext from (or independent of) the current
//! one. The shipped variants are pure; the trait is async because real
//! deployments add variants that call vendor provisioning APIs, and the
//! registry must not assume purity.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use rand::RngCore;
use thiserror::Error;
use uuid::Uuid;

/// The closed set of registered strategy kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Default,
    Postgres,
    Sendgrid,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::Default,
        StrategyKind::Postgres,
        StrategyKind::Sendgrid,
    ];

    /// Resolves a secret's `strategy_type` key to a kind.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "DEFAULT" => Some(StrategyKind::Default),
            "POSTGRES" => Some(StrategyKind::Postgres),
            "SENDGRID" => Some(StrategyKind::Sendgrid),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            StrategyKind::Default => "DEFAULT",
            StrategyKind::Postgres => "POSTGRES",
            StrategyKind::Sendgrid => "SENDGRID",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

#[derive(Debug, Error)]
#[error("strategy execution failed: {0}")]
pub struct StrategyError(pub String);

/// Computes a replacement plaintext for a secret.
#[async_trait]
pub trait RotationStrategy: Send + Sync + std::fmt::Debug {
    async fn rotate(&self, current: &str) -> Result<String, StrategyError>;
}

/// Default demonstration strategy: appends `-rotated-<unix millis>` to the
/// current value, so successive rotations are visibly ordered.
#[derive(Debug)]
pub struct TimestampSuffixStrategy;

#[async_trait]
impl RotationStrategy for TimestampSuffixStrategy {
    async fn rotate(&self, current: &str) -> Result<String, StrategyError> {
        Ok(format!("{current}-rotated-{}", Utc::now().timestamp_millis()))
    }
}

/// Postgres-style password strategy: 24 bytes from a CSPRNG, URL-safe base64
/// without padding (32 encoded chars), `pg_passwd_` prefix. Ignores the
/// current value.
#[derive(Debug)]
pub struct PostgresPasswordStrategy;

#[async_trait]
impl RotationStrategy for PostgresPasswordStrategy {
    async fn rotate(&self, _current: &str) -> Result<String, StrategyError> {
        let mut bytes = [0u8; 24];
        rand::rng().fill_bytes(&mut bytes);
        Ok(format!("pg_passwd_{}", URL_SAFE_NO_PAD.encode(bytes)))
    }
}

/// Vendor-API-style key strategy: a UUID-derived token in the shape of a
/// SendGrid API key. Ignores the current value. A real deployment would call
/// the vendor's key-provisioning API here instead.
#[derive(Debug)]
pub struct SendgridKeyStrategy;

#[async_trait]
impl RotationStrategy for SendgridKeyStrategy {
    async fn rotate(&self, _current: &str) -> Result<String, StrategyError> {
        Ok(format!(
            "SG.{}.mock_generated_key",
            Uuid::new_v4().simple()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[tokio::test]
    async fn test_default_appends_ordered_timestamps() {
        let strategy = TimestampSuffixStrategy;
        let first = strategy.rotate("abc123").await.unwrap();

        let (prefix, digits) = first.rsplit_once("-rotated-").unwrap();
        assert_eq!(prefix, "abc123");
        let first_ts: i64 = digits.parse().unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = strategy.rotate("abc123").await.unwrap();
        let second_ts: i64 = second.rsplit_once("-rotated-").unwrap().1.parse().unwrap();
        assert!(second_ts > first_ts);
    }

    #[rstest]
    #[case("")]
    #[case("old-password")]
    #[case("pg_passwd_previous")]
    #[tokio::test]
    async fn test_postgres_output_shape(#[case] input: &str) {
        let value = PostgresPasswordStrategy.rotate(input).await.unwrap();
        let encoded = value.strip_prefix("pg_passwd_").unwrap();
        assert_eq!(encoded.len(), 32);
        assert!(!encoded.contains('='));
        assert!(encoded
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[rstest]
    #[case("")]
    #[case("SG.old.key")]
    #[tokio::test]
    async fn test_sendgrid_output_shape(#[case] input: &str) {
        let value = SendgridKeyStrategy.rotate(input).await.unwrap();
        assert!(value.starts_with("SG."));
        assert!(value.ends_with(".mock_generated_key"));
        let token = &value["SG.".len()..value.len() - ".mock_generated_key".len()];
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_generators_do_not_repeat() {
        let a = PostgresPasswordStrategy.rotate("x").await.unwrap();
        let b = PostgresPasswordStrategy.rotate("x").await.unwrap();
        assert_ne!(a, b);

        let a = SendgridKeyStrategy.rotate("x").await.unwrap();
        let b = SendgridKeyStrategy.rotate("x").await.unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_kind_key_roundtrip() {
        for kind in StrategyKind::ALL {
            assert_eq!(StrategyKind::from_key(kind.key()), Some(kind));
        }
        assert_eq!(StrategyKind::from_key("VAULT"), None);
        assert_eq!(StrategyKind::from_key("default"), None);
    }
}
