//! Credential lookup for live catalogs

use crate::source::FetchError;
use ddlcompare_core::Dialect;

/// Connection credentials for one connect call
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Connection string or URL, without the password
    pub url: String,
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecretError {
    #[error("secret '{secret}' has no {field} (expected {variable})")]
    Missing {
        secret: String,
        field: &'static str,
        variable: String,
    },
}

impl From<SecretError> for FetchError {
    fn from(err: SecretError) -> Self {
        FetchError::ConfigError(err.to_string())
    }
}

/// Resolves a secret id to credentials
#[async_trait::async_trait]
pub trait SecretResolver: Send + Sync {
    async fn resolve(&self, dialect: Dialect, secret_id: &str) -> Result<Credentials, SecretError>;
}

/// Reads `<PREFIX>_<ID>_URL`, `_USER` and `_PASSWORD` from the environment
///
/// The id is upper-cased and every non-alphanumeric character becomes `_`,
/// so `prod-pg` reads `DDLCOMPARE_PROD_PG_URL`. A missing password is
/// allowed (trust or peer authentication); URL and user are required.
#[derive(Debug, Clone)]
pub struct EnvSecretResolver {
    prefix: String,
}

impl EnvSecretResolver {
    pub fn new() -> Self {
        Self::with_prefix("DDLCOMPARE")
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// Environment variable holding one field of a secret
    pub fn variable(&self, secret_id: &str, field: &str) -> String {
        let id: String = secret_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("{}_{}_{}", self.prefix, id, field)
    }

    fn read(&self, secret_id: &str, field: &'static str) -> Result<String, SecretError> {
        let variable = self.variable(secret_id, field);
        std::env::var(&variable).map_err(|_| SecretError::Missing {
            secret: secret_id.to_string(),
            field,
            variable,
        })
    }
}

impl Default for EnvSecretResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SecretResolver for EnvSecretResolver {
    async fn resolve(&self, dialect: Dialect, secret_id: &str) -> Result<Credentials, SecretError> {
        tracing::debug!(%dialect, secret = secret_id, "resolving credentials from environment");

        Ok(Credentials {
            url: self.read(secret_id, "URL")?,
            user: self.read(secret_id, "USER")?,
            password: self.read(secret_id, "PASSWORD").unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn debug_redacts_password() {
        let credentials = Credentials {
            url: "host=db port=5432".to_string(),
            user: "reader".to_string(),
            password: "hunter2".to_string(),
        };
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("reader"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn variable_names() {
        let resolver = EnvSecretResolver::new();
        assert_eq!(resolver.variable("prod-pg", "URL"), "DDLCOMPARE_PROD_PG_URL");
        assert_eq!(
            EnvSecretResolver::with_prefix("APP").variable("a.b", "USER"),
            "APP_A_B_USER"
        );
    }

    #[tokio::test]
    async fn resolves_from_environment() {
        std::env::set_var("DDLCOMPARE_SECRETS_TEST_OK_URL", "host=localhost dbname=app");
        std::env::set_var("DDLCOMPARE_SECRETS_TEST_OK_USER", "reader");
        std::env::set_var("DDLCOMPARE_SECRETS_TEST_OK_PASSWORD", "pw");

        let credentials = EnvSecretResolver::new()
            .resolve(Dialect::Postgres, "secrets_test_ok")
            .await
            .unwrap();
        assert_eq!(credentials.user, "reader");
        assert_eq!(credentials.password, "pw");
    }

    #[tokio::test]
    async fn missing_user_is_an_error() {
        std::env::set_var("DDLCOMPARE_SECRETS_TEST_PARTIAL_URL", "host=localhost");

        let err = EnvSecretResolver::new()
            .resolve(Dialect::Postgres, "secrets_test_partial")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SecretError::Missing {
                secret: "secrets_test_partial".to_string(),
                field: "USER",
                variable: "DDLCOMPARE_SECRETS_TEST_PARTIAL_USER".to_string(),
            }
        );
        assert!(matches!(FetchError::from(err), FetchError::ConfigError(_)));
    }
}
