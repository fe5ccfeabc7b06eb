//! HTTP access for every external source.
//!
//! A plain GET primitive (`HttpFetch`) is wrapped by a retry decorator and
//! then by the TTL cache in `CachedHttpClient`, so all sources share the same
//! retry and caching semantics. Nothing else in the crate talks to the network.

use std::collections::BTreeMap;

pub mod cache;
pub mod client;
pub mod fetch;
pub mod retry;

pub use cache::{cache_key, CacheEntry, ResponseCache};
pub use client::CachedHttpClient;
pub use fetch::{HttpFetch, RawResponse, ReqwestFetcher};
pub use retry::{RetryPolicy, RetryingFetcher};

/// Query parameters, kept sorted so equal requests hash to equal cache keys.
pub type QueryParams = BTreeMap<String, String>;

/// Build `QueryParams` from string pairs.
pub fn params<I, K, V>(pairs: I) -> QueryParams
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: ToString,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.to_string()))
        .collect()
}
