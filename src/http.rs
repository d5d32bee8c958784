//! Shared HTTP client construction.
//!
//! Every outbound call (weather APIs, feature store, model registry) goes
//! through a client with a bounded exponential-backoff retry policy; retry
//! exhaustion surfaces as a connection error at the call site.

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use std::time::Duration;

use crate::error::PipelineError;

pub fn retrying_client(
    timeout: Duration,
    max_retries: u32,
) -> Result<ClientWithMiddleware, PipelineError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static("aqi-forecaster/0.2"));

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()?;

    let policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);

    Ok(ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(policy))
        .build())
}
