use crate::Result;
use std::fmt::{Debug, Formatter};

/// Credential that holds the access key and secret key used to construct
/// signing strategies.
///
/// The credential is fetched from a [`ProvideCredential`] right before a
/// strategy is first constructed for a cache key; strategies hold on to it
/// for their lifetime.
#[derive(Default, Clone)]
pub struct Credential {
    /// Access key id identifying the caller.
    pub access_key_id: String,
    /// Secret access key the strategy derives signatures from.
    pub secret_access_key: String,
    /// Session token for temporary credentials.
    pub session_token: Option<String>,
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_key_id", &Redact::from(self.access_key_id.as_str()))
            .field(
                "secret_access_key",
                &Redact::from(self.secret_access_key.as_str()),
            )
            .field("session_token", &Redact::from(&self.session_token))
            .finish()
    }
}

/// Redact the value for `Debug` output so secrets never reach logs.
struct Redact<'a>(&'a str);

impl<'a> From<&'a str> for Redact<'a> {
    fn from(value: &'a str) -> Self {
        Redact(value)
    }
}

impl<'a> From<&'a Option<String>> for Redact<'a> {
    fn from(value: &'a Option<String>) -> Self {
        Redact(value.as_deref().unwrap_or_default())
    }
}

impl Debug for Redact<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let length = self.0.len();
        if length == 0 {
            f.write_str("EMPTY")
        } else if length < 12 {
            f.write_str("***")
        } else {
            f.write_str(&self.0[..3])?;
            f.write_str("***")?;
            f.write_str(&self.0[length - 3..])
        }
    }
}

/// Supplies the credential used to construct signing strategies.
///
/// Providers may refresh or fetch credentials on demand, which is why this
/// trait is async; the signer calls it once per strategy construction, not
/// once per signed request.
#[async_trait::async_trait]
pub trait ProvideCredential: Debug + Send + Sync {
    /// Provide the current credential.
    async fn provide_credential(&self) -> Result<Credential>;
}

/// A provider that always returns the same fixed credential.
#[derive(Clone)]
pub struct StaticCredentialProvider {
    credential: Credential,
}

impl StaticCredentialProvider {
    /// Create a provider from an access key id and secret access key.
    pub fn new(access_key_id: &str, secret_access_key: &str) -> Self {
        Self {
            credential: Credential {
                access_key_id: access_key_id.to_string(),
                secret_access_key: secret_access_key.to_string(),
                session_token: None,
            },
        }
    }

    /// Attach a session token to the credential.
    pub fn with_session_token(mut self, token: &str) -> Self {
        self.credential.session_token = Some(token.to_string());
        self
    }
}

impl Debug for StaticCredentialProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentialProvider")
            .field("credential", &self.credential)
            .finish()
    }
}

#[async_trait::async_trait]
impl ProvideCredential for StaticCredentialProvider {
    async fn provide_credential(&self) -> Result<Credential> {
        Ok(self.credential.clone())
    }
}
