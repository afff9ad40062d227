use crate::{Credential, Request, Result};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

/// A signing strategy embeds authentication material into a request.
///
/// Strategies are constructed once per cache key by the
/// [`RequestSigner`](crate::RequestSigner) and then reused for every request
/// signed against the same (version, region, signing name). They hold only
/// configuration and a credential, never per-call state, so a single instance
/// must stay safe for concurrent `apply` calls on different requests.
pub trait SignStrategy: Debug + Send + Sync {
    /// Embed authentication material into the request.
    ///
    /// In-place signing strategies insert auth headers; query-presign
    /// strategies push query pairs; POST-presign strategies read the policy
    /// and fields from [`Request::post_form`] and extend the fields.
    fn apply(&self, req: &mut Request) -> Result<()>;
}

/// Construction parameters handed to a strategy factory.
#[derive(Debug, Clone)]
pub struct StrategyParams {
    /// Credential obtained from the signer's provider.
    pub credential: Credential,
    /// Region to sign for. Populated only when the strategy declares a
    /// region requirement.
    pub region: Option<String>,
    /// Signing name of the service. Populated only when the strategy
    /// declares a region requirement.
    pub signing_name: Option<String>,
    /// Requested artifact lifetime, passed through for query-presign
    /// strategies that embed an expiry into the signature.
    pub expires_in: Option<Duration>,
}

/// Factory constructing a strategy from its parameters.
pub type StrategyFactory =
    Arc<dyn Fn(StrategyParams) -> Result<Arc<dyn SignStrategy>> + Send + Sync>;
