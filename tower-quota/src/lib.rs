//! # Tower Quota
//!
//! `tower-quota` puts a per-client token bucket in front of any
//! [Tower](https://github.com/tower-rs/tower) service.
//!
//! ## How it fits together
//!
//! 1. A [`KeyExtractor`] turns each request into a client key (typically the
//!    peer IP, see [`quota_bucket::client_key`]).
//! 2. The [`QuotaLayer`] asks a shared [`quota_bucket::Strategy`], normally a
//!    [`quota_bucket::Admission`], whether that key may proceed.
//! 3. Admitted requests reach the inner service. Rejected requests fail
//!    immediately with [`QuotaError::QuotaExceeded`]; nothing is queued.
//!
//! ## Feature Flags
//!
//! - `axum`: Enables `IntoResponse` for [`QuotaError`] (429 with `Retry-After`)
//!   and the `ConnectInfoKey` extractor.
//! - `server`: Enables the `server` module (the JSON `/v1/resource` app) and
//!   builds the `quota-server` demo binary.

mod error;
mod key;
mod layer;
#[cfg(feature = "server")]
pub mod server;
mod service;
mod utils;

#[cfg(test)]
mod tests;

pub use error::QuotaError;
#[cfg(feature = "axum")]
pub use key::ConnectInfoKey;
pub use key::KeyExtractor;
pub use layer::QuotaLayer;
pub use service::QuotaService;
pub use service::ResponseFuture;
pub use utils::ServiceBuilderExt;
pub use utils::make_quota_svc;
