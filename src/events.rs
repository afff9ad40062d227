use crate::{Request, RequestSigner, SignatureVersion};
use std::fmt::{Debug, Formatter};
use std::sync::Mutex;

/// Payload of a `choose-signer.<service>.<operation>` event.
///
/// Listeners may answer with a replacement version identifier; a blank
/// answer selects the unsigned sentinel and disables signing for the
/// operation.
#[derive(Debug)]
pub struct ChooseSignerEvent<'a> {
    /// Signing name of the service.
    pub signing_name: &'a str,
    /// Region the signer is configured for.
    pub region: Option<&'a str>,
    /// The version that will be used if no listener answers.
    pub signature_version: &'a SignatureVersion,
}

/// Payload of a `before-sign.<service>.<operation>` event.
///
/// Listeners may mutate the request; they run after the signature version is
/// resolved and before any strategy is dispatched, so the version they
/// observe is the one that will sign.
pub struct BeforeSignEvent<'a> {
    /// The request about to be signed.
    pub request: &'a mut Request,
    /// Signing name of the service.
    pub signing_name: &'a str,
    /// Region the signer is configured for.
    pub region: Option<&'a str>,
    /// The resolved signature version, unsigned sentinel included.
    pub signature_version: &'a SignatureVersion,
    /// The signer emitting the event, for listeners that need to build
    /// presigned artifacts or consult the signing configuration.
    pub signer: &'a RequestSigner,
}

/// Event dispatch seam between the signer and external policy.
///
/// The two dispatch semantics are separate methods on purpose: call sites
/// stay self-documenting about whether one answer is honored or every
/// listener runs.
pub trait EventBus: Debug + Send + Sync {
    /// Emit until the first listener returns a response; remaining listeners
    /// are not consulted. `None` means no listener answered.
    fn emit_until_response(&self, event: &str, payload: &ChooseSignerEvent<'_>) -> Option<String>;

    /// Broadcast to every listener; responses are ignored.
    fn emit(&self, event: &str, payload: &mut BeforeSignEvent<'_>);
}

/// An event bus with no listeners.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventBus;

impl EventBus for NoopEventBus {
    fn emit_until_response(&self, _: &str, _: &ChooseSignerEvent<'_>) -> Option<String> {
        None
    }

    fn emit(&self, _: &str, _: &mut BeforeSignEvent<'_>) {}
}

type ChooseSignerFn = Box<dyn Fn(&ChooseSignerEvent<'_>) -> Option<String> + Send + Sync>;
type BeforeSignFn = Box<dyn Fn(&mut BeforeSignEvent<'_>) + Send + Sync>;

/// In-memory [`EventBus`] with hierarchically scoped listeners.
///
/// A listener registered for scope `choose-signer.s3` receives
/// `choose-signer.s3.PutObject` as well as `choose-signer.s3` itself; scope
/// matching is on dot boundaries, so `choose-signer.s3x` does not match.
/// Multiple listeners may share a scope; for choose-signer dispatch they are
/// consulted in registration order and the first non-`None` answer wins.
#[derive(Default)]
pub struct EventHooks {
    choose_signer: Mutex<Vec<(String, ChooseSignerFn)>>,
    before_sign: Mutex<Vec<(String, BeforeSignFn)>>,
}

impl EventHooks {
    /// Create a bus with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a choose-signer listener under the given scope.
    pub fn on_choose_signer<F>(&self, scope: impl Into<String>, listener: F)
    where
        F: Fn(&ChooseSignerEvent<'_>) -> Option<String> + Send + Sync + 'static,
    {
        self.choose_signer
            .lock()
            .expect("lock poisoned")
            .push((scope.into(), Box::new(listener)));
    }

    /// Register a before-sign listener under the given scope.
    pub fn on_before_sign<F>(&self, scope: impl Into<String>, listener: F)
    where
        F: Fn(&mut BeforeSignEvent<'_>) + Send + Sync + 'static,
    {
        self.before_sign
            .lock()
            .expect("lock poisoned")
            .push((scope.into(), Box::new(listener)));
    }
}

fn scope_matches(scope: &str, event: &str) -> bool {
    match event.strip_prefix(scope) {
        Some("") => true,
        Some(rest) => rest.starts_with('.'),
        None => false,
    }
}

impl Debug for EventHooks {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHooks")
            .field(
                "choose_signer",
                &self.choose_signer.lock().expect("lock poisoned").len(),
            )
            .field(
                "before_sign",
                &self.before_sign.lock().expect("lock poisoned").len(),
            )
            .finish()
    }
}

impl EventBus for EventHooks {
    fn emit_until_response(&self, event: &str, payload: &ChooseSignerEvent<'_>) -> Option<String> {
        let listeners = self.choose_signer.lock().expect("lock poisoned");
        for (scope, listener) in listeners.iter() {
            if !scope_matches(scope, event) {
                continue;
            }
            if let Some(response) = listener(payload) {
                return Some(response);
            }
        }
        None
    }

    fn emit(&self, event: &str, payload: &mut BeforeSignEvent<'_>) {
        let listeners = self.before_sign.lock().expect("lock poisoned");
        for (scope, listener) in listeners.iter() {
            if scope_matches(scope, event) {
                listener(payload);
            }
        }
    }
}
