use crate::Request;
use std::fmt::Debug;

/// Rewrites a request's host and path for legacy bucket-style addressing.
///
/// Presigning invokes this with the *base* family of the variant version
/// (`v4-query` rewrites as family `v4`) so older signature families can be
/// corrected between path-style and virtual-host addressing. The default is
/// a no-op; storage-service integrations supply their own.
pub trait RewriteEndpoint: Debug + Send + Sync {
    /// Rewrite the request's authority/path in place.
    fn rewrite(&self, req: &mut Request, family: &str, region: Option<&str>);
}

/// A rewriter that leaves every request untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRewriteEndpoint;

impl RewriteEndpoint for NoopRewriteEndpoint {
    fn rewrite(&self, _: &mut Request, _: &str, _: Option<&str>) {}
}
