use crate::{
    BeforeSignEvent, ChooseSignerEvent, Error, EventBus, NoopEventBus, NoopRewriteEndpoint,
    PolicyDocument, PostFormContext, PresignVariant, ProvideCredential, Request,
    RequestDescriptor, Result, RewriteEndpoint, SignStrategy, SignatureVersion, StrategyParams,
    StrategyRegistry,
};
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Immutable signing configuration shared by every call on one
/// [`RequestSigner`].
#[derive(Debug, Clone)]
pub struct SigningContext {
    service: String,
    region: Option<String>,
    signing_name: String,
    signature_version: SignatureVersion,
    credentials: Arc<dyn ProvideCredential>,
    events: Arc<dyn EventBus>,
}

impl SigningContext {
    /// Create a signing context.
    ///
    /// The signing name is the identifier strategies use for the service in
    /// signatures; it usually equals the service name but can differ. The
    /// context starts region-less with no event listeners; use the `with_*`
    /// methods to configure those.
    pub fn new(
        service: impl Into<String>,
        signing_name: impl Into<String>,
        signature_version: SignatureVersion,
        credentials: impl ProvideCredential + 'static,
    ) -> Self {
        Self {
            service: service.into(),
            region: None,
            signing_name: signing_name.into(),
            signature_version,
            credentials: Arc::new(credentials),
            events: Arc::new(NoopEventBus),
        }
    }

    /// Set the region to sign for.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Replace the event bus implementation.
    pub fn with_event_bus(mut self, events: impl EventBus + 'static) -> Self {
        self.events = Arc::new(events);
        self
    }

    /// Replace the event bus implementation with a shared one.
    pub fn with_shared_event_bus(mut self, events: Arc<dyn EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Name of the service this context signs for.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Region this context signs for, if any.
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Signing name strategies embed into signatures.
    pub fn signing_name(&self) -> &str {
        &self.signing_name
    }

    /// The default signature version, before any per-operation override.
    pub fn signature_version(&self) -> &SignatureVersion {
        &self.signature_version
    }

    fn events(&self) -> &dyn EventBus {
        self.events.as_ref()
    }

    fn credentials(&self) -> &dyn ProvideCredential {
        self.credentials.as_ref()
    }
}

/// Cache key for constructed strategies.
///
/// A typed tuple rather than a joined string, so identifiers containing the
/// join separator can never collide across versions or regions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    version: SignatureVersion,
    region: Option<String>,
    signing_name: String,
}

/// Arguments for [`RequestSigner::build_post_form_args`].
#[derive(Debug, Clone)]
pub struct PostFormRequest {
    /// Form fields to include alongside the strategy-added signature fields.
    pub fields: HashMap<String, String>,
    /// Policy conditions, signed in the order given.
    pub conditions: Vec<serde_json::Value>,
    /// Lifetime of the form, defaults to one hour.
    pub expires_in: Duration,
    /// Region override; falls back to the signer's region.
    pub region: Option<String>,
}

impl Default for PostFormRequest {
    fn default() -> Self {
        Self {
            fields: HashMap::new(),
            conditions: Vec::new(),
            expires_in: Duration::from_secs(3600),
            region: None,
        }
    }
}

impl PostFormRequest {
    /// Pre-populate form fields.
    pub fn with_fields(mut self, fields: HashMap<String, String>) -> Self {
        self.fields = fields;
        self
    }

    /// Set the policy conditions.
    pub fn with_conditions(mut self, conditions: Vec<serde_json::Value>) -> Self {
        self.conditions = conditions;
        self
    }

    /// Set the form lifetime.
    pub fn with_expires_in(mut self, expires_in: Duration) -> Self {
        self.expires_in = expires_in;
        self
    }

    /// Override the region to sign for.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

/// A presigned POST form: the url to POST to and the fields to submit with
/// the file content.
#[derive(Debug, Clone)]
pub struct PostForm {
    /// The endpoint url the form targets. Signature material is carried in
    /// the fields, never serialized into this url.
    pub url: String,
    /// Caller-supplied fields plus the signature, policy, and credential
    /// fields the strategy added.
    pub fields: HashMap<String, String>,
}

/// Signs requests before they go out over the wire, using one of the
/// strategies registered for its signature versions.
///
/// The signer fires two events scoped to service and operation:
///
/// * `choose-signer`: allows overriding the signature version, first answer
///   wins. A blank answer disables signing for the operation.
/// * `before-sign`: allows mutating the request before signing, broadcast to
///   every listener.
///
/// Constructed strategies are cached per (version, region, signing name) for
/// the signer's lifetime, since one signer serves many requests of a single
/// client. Each signer owns an independent cache.
#[derive(Debug)]
pub struct RequestSigner {
    ctx: SigningContext,
    registry: StrategyRegistry,
    rewriter: Arc<dyn RewriteEndpoint>,
    cache: Mutex<HashMap<CacheKey, Arc<dyn SignStrategy>>>,
}

impl RequestSigner {
    /// Create a signer from a context and a strategy registry.
    pub fn new(ctx: SigningContext, registry: StrategyRegistry) -> Self {
        Self {
            ctx,
            registry,
            rewriter: Arc::new(NoopRewriteEndpoint),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the endpoint rewriter applied during presigning.
    pub fn with_endpoint_rewriter(mut self, rewriter: impl RewriteEndpoint + 'static) -> Self {
        self.rewriter = Arc::new(rewriter);
        self
    }

    /// The signing configuration of this signer.
    pub fn context(&self) -> &SigningContext {
        &self.ctx
    }

    /// Sign a request in place.
    ///
    /// Resolves the effective signature version through the choose-signer
    /// event, broadcasts before-sign (which always runs, even when signing
    /// is subsequently skipped), and applies the resolved strategy. On
    /// success the request carries complete auth material; on failure it is
    /// left exactly as it was after the before-sign broadcast, which is not
    /// rolled back.
    pub async fn sign(&self, operation: &str, req: &mut Request) -> Result<()> {
        let mut version = self.ctx.signature_version().clone();

        // A blank answer selects the unsigned sentinel; no answer keeps the
        // configured default.
        let event = format!("choose-signer.{}.{}", self.ctx.service(), operation);
        let payload = ChooseSignerEvent {
            signing_name: self.ctx.signing_name(),
            region: self.ctx.region(),
            signature_version: &version,
        };
        if let Some(response) = self.ctx.events().emit_until_response(&event, &payload) {
            debug!("operation {operation} overrides signature version to {response:?}");
            version = SignatureVersion::new(response);
        }

        let event = format!("before-sign.{}.{}", self.ctx.service(), operation);
        let mut payload = BeforeSignEvent {
            request: req,
            signing_name: self.ctx.signing_name(),
            region: self.ctx.region(),
            signature_version: &version,
            signer: self,
        };
        self.ctx.events().emit(&event, &mut payload);

        if version.is_unsigned() {
            debug!("operation {operation} resolved to unsigned, skipping signing");
            return Ok(());
        }

        let strategy = self
            .strategy(self.ctx.signing_name(), self.ctx.region(), &version, None)
            .await?;
        strategy.apply(req)
    }

    /// Get the cached strategy for (version, region, signing name), or build
    /// and cache it.
    ///
    /// The region falls back to the signer's configured region; the resolved
    /// value feeds both the cache key and the region-requirement check. The
    /// requirement is checked before the credential provider is consulted,
    /// so a missing region never triggers a credential fetch. `expires_in`
    /// is a construction extra for query-presign strategies and is not part
    /// of the cache key.
    pub async fn strategy(
        &self,
        signing_name: &str,
        region: Option<&str>,
        version: &SignatureVersion,
        expires_in: Option<Duration>,
    ) -> Result<Arc<dyn SignStrategy>> {
        let region = region.or_else(|| self.ctx.region());
        let key = CacheKey {
            version: version.clone(),
            region: region.map(String::from),
            signing_name: signing_name.to_string(),
        };

        if let Some(strategy) = self.cache.lock().expect("lock poisoned").get(&key) {
            return Ok(strategy.clone());
        }

        let entry = self.registry.get(version).ok_or_else(|| {
            Error::unknown_signature_version(format!(
                "no strategy registered for signature version {version}"
            ))
        })?;

        if entry.requires_region && region.is_none() {
            return Err(Error::missing_region(format!(
                "signature version {version} requires a region, \
                 but none was given and the signer has no default"
            )));
        }

        let credential = self.ctx.credentials().provide_credential().await?;
        let params = StrategyParams {
            credential,
            region: if entry.requires_region {
                region.map(String::from)
            } else {
                None
            },
            signing_name: entry
                .requires_region
                .then(|| signing_name.to_string()),
            expires_in,
        };
        let strategy = (entry.factory)(params)?;
        debug!("constructed signing strategy for {key:?}");

        // Racing first-builds keep whichever instance landed first; the
        // loser's strategy is dropped so identity stays stable per key.
        let mut cache = self.cache.lock().expect("lock poisoned");
        Ok(cache.entry(key).or_insert(strategy).clone())
    }

    /// Produce a presigned url for the described request.
    ///
    /// Uses the query-presign variant of the configured version; the
    /// choose-signer and before-sign events are in-place-signing concerns
    /// and do not fire here. No network call occurs.
    pub async fn generate_url(
        &self,
        descriptor: RequestDescriptor,
        expires_in: Option<Duration>,
        region: Option<&str>,
    ) -> Result<String> {
        let region = region.or_else(|| self.ctx.region());
        let version = self
            .ctx
            .signature_version()
            .with_variant(PresignVariant::Query);
        let strategy = self
            .strategy(self.ctx.signing_name(), region, &version, expires_in)
            .await?;

        let mut request = Request::from_descriptor(descriptor)?;
        self.rewriter.rewrite(&mut request, version.family(), region);
        strategy.apply(&mut request)?;

        Ok(request.finalized_url())
    }

    /// Produce a presigned POST form for the described request.
    ///
    /// Builds a fresh policy document expiring `expires_in` from now, hands
    /// it with the caller's fields to the POST-presign variant strategy, and
    /// returns the fields the strategy extended.
    ///
    /// Unlike [`generate_url`](Self::generate_url), the returned url is the
    /// raw endpoint url without query serialization, and the endpoint
    /// rewrite runs after the strategy: POST consumers target the endpoint
    /// itself and submit the signature as form data.
    pub async fn build_post_form_args(
        &self,
        descriptor: RequestDescriptor,
        form: PostFormRequest,
    ) -> Result<PostForm> {
        let PostFormRequest {
            fields,
            conditions,
            expires_in,
            region,
        } = form;
        let region = region.as_deref().or_else(|| self.ctx.region());

        let policy = PolicyDocument::expiring_in(expires_in, conditions);
        let version = self
            .ctx
            .signature_version()
            .with_variant(PresignVariant::PostForm);
        let strategy = self
            .strategy(self.ctx.signing_name(), region, &version, None)
            .await?;

        let mut request = Request::from_descriptor(descriptor)?;
        request.post_form = Some(PostFormContext { fields, policy });
        strategy.apply(&mut request)?;
        self.rewriter.rewrite(&mut request, version.family(), region);

        let fields = request
            .post_form
            .take()
            .map(|form| form.fields)
            .unwrap_or_default();
        Ok(PostForm {
            url: request.endpoint_url(),
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Credential, ErrorKind, EventHooks};
    use chrono::{DateTime, TimeDelta, Utc};
    use http::Method;
    use http::Uri;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Stub strategy that leaves an observable marker wherever it signs:
    /// headers for in-place signing, fields for POST forms.
    #[derive(Debug)]
    struct MarkerStrategy {
        marker: String,
    }

    impl SignStrategy for MarkerStrategy {
        fn apply(&self, req: &mut Request) -> Result<()> {
            if let Some(form) = req.post_form.as_mut() {
                form.fields
                    .insert("x-signature".to_string(), self.marker.clone());
                form.fields
                    .insert("x-policy-expiration".to_string(), form.policy.expiration.clone());
                form.fields.insert(
                    "x-policy-conditions".to_string(),
                    serde_json::to_string(&form.policy.conditions)
                        .map_err(|err| Error::unexpected(err.to_string()))?,
                );
            } else {
                req.headers.insert(
                    http::header::AUTHORIZATION,
                    self.marker.parse().map_err(Error::from)?,
                );
                req.query_push("X-Signature", self.marker.clone());
            }
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct SpyCredentialProvider {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl ProvideCredential for SpyCredentialProvider {
        async fn provide_credential(&self) -> Result<Credential> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Credential {
                access_key_id: "ak".to_string(),
                secret_access_key: "sk".to_string(),
                session_token: None,
            })
        }
    }

    #[derive(Debug, Clone)]
    struct RewriteCall {
        family: String,
        region: Option<String>,
        query_len: usize,
        post_form_signed: bool,
    }

    #[derive(Debug, Default)]
    struct RecordingRewriter {
        calls: Arc<Mutex<Vec<RewriteCall>>>,
    }

    impl RewriteEndpoint for RecordingRewriter {
        fn rewrite(&self, req: &mut Request, family: &str, region: Option<&str>) {
            self.calls.lock().unwrap().push(RewriteCall {
                family: family.to_string(),
                region: region.map(String::from),
                query_len: req.query.len(),
                post_form_signed: req
                    .post_form
                    .as_ref()
                    .is_some_and(|form| form.fields.contains_key("x-signature")),
            });
        }
    }

    /// Registry with marker strategies whose factory invocations are counted.
    fn marker_registry(versions: &[(&str, bool)], built: Arc<AtomicUsize>) -> StrategyRegistry {
        let mut registry = StrategyRegistry::new();
        for (version, requires_region) in versions {
            let marker = version.to_string();
            let built = built.clone();
            registry = registry.register(*version, *requires_region, move |_| {
                built.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(MarkerStrategy {
                    marker: marker.clone(),
                }) as Arc<dyn SignStrategy>)
            });
        }
        registry
    }

    fn context(version: &str) -> SigningContext {
        SigningContext::new(
            "s3",
            "s3",
            SignatureVersion::new(version),
            SpyCredentialProvider::default(),
        )
        .with_region("us-east-1")
    }

    fn request(url: &str) -> Request {
        Request::from_descriptor(RequestDescriptor::new(Method::GET, url)).unwrap()
    }

    #[tokio::test]
    async fn test_same_key_returns_same_instance() {
        let built = Arc::new(AtomicUsize::new(0));
        let signer = RequestSigner::new(
            context("v4"),
            marker_registry(&[("v4", true)], built.clone()),
        );

        let version = SignatureVersion::new("v4");
        let first = signer.strategy("s3", None, &version, None).await.unwrap();
        let second = signer.strategy("s3", None, &version, None).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_return_distinct_instances() {
        let built = Arc::new(AtomicUsize::new(0));
        let signer = RequestSigner::new(
            context("v4"),
            marker_registry(&[("v4", true), ("v4-query", true)], built.clone()),
        );

        let v4 = SignatureVersion::new("v4");
        let base = signer.strategy("s3", None, &v4, None).await.unwrap();
        let other_region = signer
            .strategy("s3", Some("eu-west-1"), &v4, None)
            .await
            .unwrap();
        let query = signer
            .strategy("s3", None, &SignatureVersion::new("v4-query"), None)
            .await
            .unwrap();

        assert!(!Arc::ptr_eq(&base, &other_region));
        assert!(!Arc::ptr_eq(&base, &query));
        assert_eq!(built.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_explicit_region_shares_cache_with_context_fallback() {
        let built = Arc::new(AtomicUsize::new(0));
        let signer = RequestSigner::new(
            context("v4"),
            marker_registry(&[("v4", true)], built.clone()),
        );

        let version = SignatureVersion::new("v4");
        let implicit = signer.strategy("s3", None, &version, None).await.unwrap();
        let explicit = signer
            .strategy("s3", Some("us-east-1"), &version, None)
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&implicit, &explicit));
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sign_applies_configured_version() {
        let built = Arc::new(AtomicUsize::new(0));
        let signer = RequestSigner::new(
            context("v4"),
            marker_registry(&[("v4", true)], built.clone()),
        );

        let mut req = request("https://examplebucket.s3.amazonaws.com/key");
        signer.sign("PutObject", &mut req).await.unwrap();

        assert_eq!(req.headers["authorization"], "v4");
    }

    #[tokio::test]
    async fn test_choose_signer_override_replaces_version() {
        let hooks = EventHooks::new();
        hooks.on_choose_signer("choose-signer.s3.GetObject", |_| Some("v2".to_string()));

        let built = Arc::new(AtomicUsize::new(0));
        let signer = RequestSigner::new(
            context("v4").with_event_bus(hooks),
            marker_registry(&[("v4", true), ("v2", false)], built.clone()),
        );

        let mut req = request("https://examplebucket.s3.amazonaws.com/key");
        signer.sign("GetObject", &mut req).await.unwrap();
        assert_eq!(req.headers["authorization"], "v2");

        // Other operations keep the default.
        let mut req = request("https://examplebucket.s3.amazonaws.com/key");
        signer.sign("PutObject", &mut req).await.unwrap();
        assert_eq!(req.headers["authorization"], "v4");
    }

    #[tokio::test]
    async fn test_blank_override_skips_signing() {
        let hooks = EventHooks::new();
        hooks.on_choose_signer("choose-signer.s3", |_| Some(String::new()));

        let built = Arc::new(AtomicUsize::new(0));
        let provider = SpyCredentialProvider::default();
        let provider_calls = provider.calls.clone();
        let ctx = SigningContext::new("s3", "s3", SignatureVersion::new("v4"), provider)
            .with_region("us-east-1")
            .with_event_bus(hooks);
        let signer = RequestSigner::new(ctx, marker_registry(&[("v4", true)], built.clone()));

        let mut req = request("https://examplebucket.s3.amazonaws.com/key");
        signer.sign("PutObject", &mut req).await.unwrap();

        assert!(req.headers.is_empty());
        assert!(req.query.is_empty());
        assert_eq!(built.load(Ordering::SeqCst), 0);
        assert_eq!(provider_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_before_sign_always_runs_and_sees_resolved_version() {
        let hooks = EventHooks::new();
        hooks.on_choose_signer("choose-signer.s3", |_| Some(String::new()));

        let observed = Arc::new(Mutex::new(Vec::new()));
        let seen = observed.clone();
        hooks.on_before_sign("before-sign.s3", move |payload| {
            seen.lock().unwrap().push((
                payload.signature_version.clone(),
                payload.signer.context().signing_name().to_string(),
            ));
            payload
                .request
                .headers
                .insert("x-mutated", "1".parse().unwrap());
        });

        let built = Arc::new(AtomicUsize::new(0));
        let signer = RequestSigner::new(
            context("v4").with_event_bus(hooks),
            marker_registry(&[("v4", true)], built.clone()),
        );

        let mut req = request("https://examplebucket.s3.amazonaws.com/key");
        signer.sign("PutObject", &mut req).await.unwrap();

        // The hook ran even though signing was skipped, and it observed the
        // post-resolution version.
        assert_eq!(req.headers["x-mutated"], "1");
        let observed = observed.lock().unwrap();
        assert_eq!(observed.len(), 1);
        assert!(observed[0].0.is_unsigned());
        assert_eq!(observed[0].1, "s3");
        assert_eq!(built.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_version_fails_and_keeps_request_intact() {
        let hooks = EventHooks::new();
        hooks.on_before_sign("before-sign.s3", |payload| {
            payload
                .request
                .headers
                .insert("x-mutated", "1".parse().unwrap());
        });

        let signer = RequestSigner::new(
            context("v99").with_event_bus(hooks),
            StrategyRegistry::new(),
        );

        let mut req = request("https://examplebucket.s3.amazonaws.com/key?versionId=3");
        let err = signer.sign("PutObject", &mut req).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnknownSignatureVersion);
        // Only the before-sign mutation is visible; nothing was signed.
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.headers["x-mutated"], "1");
        assert_eq!(req.query, vec![("versionId".to_string(), "3".to_string())]);
    }

    #[tokio::test]
    async fn test_missing_region_fails_before_credential_lookup() {
        let built = Arc::new(AtomicUsize::new(0));
        let provider = SpyCredentialProvider::default();
        let provider_calls = provider.calls.clone();
        let ctx = SigningContext::new("s3", "s3", SignatureVersion::new("v4"), provider);
        let signer = RequestSigner::new(ctx, marker_registry(&[("v4", true)], built.clone()));

        let err = signer
            .strategy("s3", None, &SignatureVersion::new("v4"), None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MissingRegion);
        assert_eq!(provider_calls.load(Ordering::SeqCst), 0);
        assert_eq!(built.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_regionless_strategy_skips_region_params() {
        let received = Arc::new(Mutex::new(None));
        let seen = received.clone();
        let registry = StrategyRegistry::new().register("anon", false, move |params| {
            *seen.lock().unwrap() = Some(params);
            Ok(Arc::new(MarkerStrategy {
                marker: "anon".to_string(),
            }) as Arc<dyn SignStrategy>)
        });

        let signer = RequestSigner::new(context("anon"), registry);
        signer
            .strategy("s3", None, &SignatureVersion::new("anon"), None)
            .await
            .unwrap();

        let params = received.lock().unwrap().take().unwrap();
        assert_eq!(params.region, None);
        assert_eq!(params.signing_name, None);
        assert_eq!(params.credential.access_key_id, "ak");
    }

    #[tokio::test]
    async fn test_generate_url_embeds_strategy_query() {
        let built = Arc::new(AtomicUsize::new(0));
        let rewriter = RecordingRewriter::default();
        let rewrites = rewriter.calls.clone();
        let signer = RequestSigner::new(
            context("v4"),
            marker_registry(&[("v4-query", true)], built.clone()),
        )
        .with_endpoint_rewriter(rewriter);

        let url = signer
            .generate_url(
                RequestDescriptor::new(
                    Method::GET,
                    "https://examplebucket.s3.amazonaws.com/key?versionId=3",
                ),
                Some(Duration::from_secs(900)),
                None,
            )
            .await
            .unwrap();

        let uri: Uri = url.parse().unwrap();
        let query: Vec<(String, String)> =
            form_urlencoded::parse(uri.query().unwrap().as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
        assert!(query.contains(&("versionId".to_string(), "3".to_string())));
        assert!(query.contains(&("X-Signature".to_string(), "v4-query".to_string())));

        // The rewriter saw the base family and ran before the strategy
        // appended its query pairs.
        let rewrites = rewrites.lock().unwrap();
        assert_eq!(rewrites.len(), 1);
        assert_eq!(rewrites[0].family, "v4");
        assert_eq!(rewrites[0].region.as_deref(), Some("us-east-1"));
        assert_eq!(rewrites[0].query_len, 1);
    }

    #[tokio::test]
    async fn test_generate_url_passes_expiry_to_factory() {
        let received = Arc::new(Mutex::new(None));
        let seen = received.clone();
        let registry = StrategyRegistry::new().register("v4-query", true, move |params| {
            *seen.lock().unwrap() = Some(params.expires_in);
            Ok(Arc::new(MarkerStrategy {
                marker: "q".to_string(),
            }) as Arc<dyn SignStrategy>)
        });

        let signer = RequestSigner::new(context("v4"), registry);
        signer
            .generate_url(
                RequestDescriptor::new(Method::GET, "https://example.com/key"),
                Some(Duration::from_secs(900)),
                None,
            )
            .await
            .unwrap();

        assert_eq!(
            received.lock().unwrap().take().unwrap(),
            Some(Duration::from_secs(900))
        );
    }

    #[tokio::test]
    async fn test_generate_url_derives_variant_idempotently() {
        let built = Arc::new(AtomicUsize::new(0));
        // The configured version already carries the query suffix.
        let signer = RequestSigner::new(
            context("v4-query"),
            marker_registry(&[("v4-query", true)], built.clone()),
        );

        let url = signer
            .generate_url(
                RequestDescriptor::new(Method::GET, "https://example.com/key"),
                None,
                None,
            )
            .await
            .unwrap();

        assert!(url.contains("X-Signature=v4-query"));
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_build_post_form_args() {
        let built = Arc::new(AtomicUsize::new(0));
        let rewriter = RecordingRewriter::default();
        let rewrites = rewriter.calls.clone();
        let signer = RequestSigner::new(
            context("v4"),
            marker_registry(&[("v4-presign-post", true)], built.clone()),
        )
        .with_endpoint_rewriter(rewriter);

        let before = Utc::now();
        let form = signer
            .build_post_form_args(
                RequestDescriptor::new(Method::POST, "https://s3.amazonaws.com/examplebucket"),
                PostFormRequest::default()
                    .with_fields(HashMap::from([(
                        "key".to_string(),
                        "uploads/object".to_string(),
                    )]))
                    .with_conditions(vec![json!({"acl": "public-read"})])
                    .with_expires_in(Duration::from_secs(600)),
            )
            .await
            .unwrap();
        let after = Utc::now();

        // Raw endpoint url: no query serialization, unlike generate_url.
        assert_eq!(form.url, "https://s3.amazonaws.com/examplebucket");

        // Caller fields survive next to the strategy-added ones.
        assert_eq!(form.fields["key"], "uploads/object");
        assert_eq!(form.fields["x-signature"], "v4-presign-post");
        assert_eq!(form.fields["x-policy-conditions"], r#"[{"acl":"public-read"}]"#);

        let expiration = DateTime::parse_from_rfc3339(&form.fields["x-policy-expiration"])
            .unwrap()
            .with_timezone(&Utc);
        assert!(expiration >= before + TimeDelta::seconds(600) - TimeDelta::seconds(1));
        assert!(expiration <= after + TimeDelta::seconds(600) + TimeDelta::seconds(1));

        // The rewriter saw the base family and ran after the strategy signed.
        let rewrites = rewrites.lock().unwrap();
        assert_eq!(rewrites.len(), 1);
        assert_eq!(rewrites[0].family, "v4");
        assert!(rewrites[0].post_form_signed);
    }

    #[tokio::test]
    async fn test_build_post_form_args_defaults() {
        let built = Arc::new(AtomicUsize::new(0));
        let signer = RequestSigner::new(
            context("v4"),
            marker_registry(&[("v4-presign-post", true)], built.clone()),
        );

        let form = signer
            .build_post_form_args(
                RequestDescriptor::new(Method::POST, "https://s3.amazonaws.com/examplebucket"),
                PostFormRequest::default(),
            )
            .await
            .unwrap();

        assert_eq!(form.fields["x-policy-conditions"], "[]");

        // Default lifetime is one hour.
        let expiration = DateTime::parse_from_rfc3339(&form.fields["x-policy-expiration"])
            .unwrap()
            .with_timezone(&Utc);
        assert!(expiration > Utc::now() + TimeDelta::seconds(3590));
    }

    #[tokio::test]
    async fn test_presign_variants_cached_separately_from_base() {
        let built = Arc::new(AtomicUsize::new(0));
        let signer = RequestSigner::new(
            context("v4"),
            marker_registry(
                &[("v4", true), ("v4-query", true), ("v4-presign-post", true)],
                built.clone(),
            ),
        );

        let mut req = request("https://examplebucket.s3.amazonaws.com/key");
        signer.sign("PutObject", &mut req).await.unwrap();
        signer
            .generate_url(
                RequestDescriptor::new(Method::GET, "https://example.com/key"),
                None,
                None,
            )
            .await
            .unwrap();
        signer
            .build_post_form_args(
                RequestDescriptor::new(Method::POST, "https://example.com/bucket"),
                PostFormRequest::default(),
            )
            .await
            .unwrap();

        assert_eq!(built.load(Ordering::SeqCst), 3);
    }
}
