use crate::{Error, PolicyDocument, Result};
use bytes::Bytes;
use http::uri::{Authority, PathAndQuery, Scheme};
use http::{HeaderMap, Method, Uri};
use std::collections::HashMap;

/// The mutable request a signing strategy operates on.
///
/// Strategies embed their signature by inserting headers or pushing query
/// pairs; the orchestrator never interprets those mutations, it only
/// serializes them when producing a presigned url.
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method.
    pub method: Method,
    /// HTTP scheme.
    pub scheme: Scheme,
    /// HTTP authority.
    pub authority: Authority,
    /// HTTP path.
    pub path: String,
    /// HTTP query parameters.
    pub query: Vec<(String, String)>,
    /// HTTP headers.
    pub headers: HeaderMap,
    /// HTTP body.
    pub body: Bytes,
    /// POST-presign payload, set only by
    /// [`build_post_form_args`](crate::RequestSigner::build_post_form_args).
    ///
    /// Carrying the policy and fields here keeps them off the wire-visible
    /// parts of the request until the strategy decides how to serialize them.
    pub post_form: Option<PostFormContext>,
}

/// Policy document and form fields smuggled to a POST-presign strategy.
#[derive(Debug, Clone)]
pub struct PostFormContext {
    /// Form fields the strategy extends with signature, policy, and
    /// credential entries. Caller-supplied entries are kept as-is.
    pub fields: HashMap<String, String>,
    /// The upload policy to sign.
    pub policy: PolicyDocument,
}

/// Description of a request to presign, before it is materialized into a
/// mutable [`Request`].
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// HTTP method.
    pub method: Method,
    /// Absolute url, e.g. `https://examplebucket.s3.amazonaws.com/object`.
    pub url: String,
    /// Headers to carry into the materialized request.
    pub headers: HeaderMap,
    /// Body to carry into the materialized request.
    pub body: Bytes,
}

impl RequestDescriptor {
    /// Create a descriptor for the given method and absolute url.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Replace the headers carried into the request.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Replace the body carried into the request.
    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }
}

impl Request {
    /// Materialize a request from a descriptor.
    ///
    /// The descriptor url must be absolute: a scheme-less or host-less url
    /// cannot be signed.
    pub fn from_descriptor(descriptor: RequestDescriptor) -> Result<Self> {
        let uri: Uri = descriptor.url.parse()?;
        let parts = uri.into_parts();
        let paq = parts
            .path_and_query
            .unwrap_or_else(|| PathAndQuery::from_static("/"));

        Ok(Request {
            method: descriptor.method,
            scheme: parts.scheme.unwrap_or(Scheme::HTTPS),
            authority: parts.authority.ok_or_else(|| {
                Error::request_invalid(format!(
                    "url {} has no authority and cannot be signed",
                    descriptor.url
                ))
            })?,
            path: paq.path().to_string(),
            query: paq
                .query()
                .map(|v| {
                    form_urlencoded::parse(v.as_bytes())
                        .map(|(k, v)| (k.into_owned(), v.into_owned()))
                        .collect()
                })
                .unwrap_or_default(),
            headers: descriptor.headers,
            body: descriptor.body,
            post_form: None,
        })
    }

    /// Push a new query pair into the query list.
    #[inline]
    pub fn query_push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.query.push((key.into(), value.into()));
    }

    /// The endpoint url without query serialization: scheme, authority, and
    /// path only.
    ///
    /// This is what a presigned POST form targets; signature material travels
    /// in the form fields, never in the url.
    pub fn endpoint_url(&self) -> String {
        format!("{}://{}{}", self.scheme, self.authority, self.path)
    }

    /// The finalized url with all accumulated query pairs serialized, in
    /// order, percent-encoded.
    pub fn finalized_url(&self) -> String {
        let base = self.endpoint_url();
        if self.query.is_empty() {
            return base;
        }

        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter())
            .finish();
        format!("{base}?{query}")
    }
}
