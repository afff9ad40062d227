//! Signature version dispatch, signer caching, and presigning for API requests.
//!
//! This crate is the orchestration layer between a request-execution pipeline
//! and the signing algorithms themselves: given an outgoing request it decides
//! which signature version applies, lets external policy override that choice
//! or mutate the request first, obtains (or reuses) the strategy instance for
//! that version, and applies it — in place, or out-of-band as a presigned url
//! or a presigned POST form.
//!
//! ## Overview
//!
//! The crate is built around a few seams:
//!
//! - [`SignStrategy`]: the pluggable signing algorithm, constructed through a
//!   [`StrategyRegistry`] keyed by [`SignatureVersion`] identifier
//! - [`ProvideCredential`]: supplies the credential strategies are built with
//! - [`EventBus`]: lets listeners override the version per operation
//!   (`choose-signer`) or mutate requests before signing (`before-sign`)
//! - [`RequestSigner`]: the orchestrator tying them together, with a
//!   per-instance cache of constructed strategies
//!
//! The signing algorithms, credential refresh, endpoint rewriting, and wire
//! transmission all live behind these seams; this crate implements none of
//! them.
//!
//! ## Example
//!
//! ```no_run
//! use signhub::{
//!     Request, RequestDescriptor, RequestSigner, SignStrategy, SignatureVersion,
//!     SigningContext, StaticCredentialProvider, StrategyRegistry,
//! };
//! use std::sync::Arc;
//!
//! # #[derive(Debug)]
//! # struct HmacV4;
//! # impl SignStrategy for HmacV4 {
//! #     fn apply(&self, _: &mut Request) -> signhub::Result<()> {
//! #         Ok(())
//! #     }
//! # }
//! # async fn example() -> signhub::Result<()> {
//! // Register a strategy per signature version. The flag declares whether
//! // the strategy needs a region to be constructed.
//! let registry = StrategyRegistry::new().register("v4", true, |params| {
//!     let _ = params.credential;
//!     Ok(Arc::new(HmacV4) as Arc<dyn SignStrategy>)
//! });
//!
//! let ctx = SigningContext::new(
//!     "s3",
//!     "s3",
//!     SignatureVersion::new("v4"),
//!     StaticCredentialProvider::new("access_key_id", "secret_access_key"),
//! )
//! .with_region("us-east-1");
//!
//! let signer = RequestSigner::new(ctx, registry);
//!
//! // Sign a request in place.
//! let descriptor = RequestDescriptor::new(
//!     http::Method::GET,
//!     "https://examplebucket.s3.amazonaws.com/object",
//! );
//! let mut req = Request::from_descriptor(descriptor.clone())?;
//! signer.sign("GetObject", &mut req).await?;
//!
//! // Or produce a presigned url instead.
//! let url = signer
//!     .generate_url(descriptor, Some(std::time::Duration::from_secs(900)), None)
//!     .await?;
//! # Ok(())
//! # }
//! ```

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

mod error;
pub use error::{Error, ErrorKind, Result};
mod version;
pub use version::{PresignVariant, SignatureVersion};
mod credential;
pub use credential::{Credential, ProvideCredential, StaticCredentialProvider};
mod policy;
pub use policy::PolicyDocument;
mod request;
pub use request::{PostFormContext, Request, RequestDescriptor};
mod strategy;
pub use strategy::{SignStrategy, StrategyFactory, StrategyParams};
mod registry;
pub use registry::StrategyRegistry;
mod events;
pub use events::{BeforeSignEvent, ChooseSignerEvent, EventBus, EventHooks, NoopEventBus};
mod endpoint;
pub use endpoint::{NoopRewriteEndpoint, RewriteEndpoint};
mod signer;
pub use signer::{PostForm, PostFormRequest, RequestSigner, SigningContext};
