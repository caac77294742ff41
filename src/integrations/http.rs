//! Request execution shared by the adapters
//!
//! Each request is cloned per attempt and retried through [`with_retry`];
//! non-2xx answers are turned into [`SyncError`] variants the retry layer
//! knows how to classify.

use super::retry::{with_retry, RetryConfig};
use crate::{Result, SyncError};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Send a request and return the successful response
pub async fn send(
    retry: &RetryConfig,
    operation: &str,
    request: RequestBuilder,
) -> Result<Response> {
    with_retry(retry, operation, || {
        let attempt = request.try_clone();
        async move {
            let attempt = attempt.ok_or_else(|| {
                SyncError::Other(format!("{operation}: request body cannot be replayed"))
            })?;
            let response = attempt.send().await?;
            check_status(operation, response).await
        }
    })
    .await
}

/// Send a request and decode its JSON body
pub async fn send_json<T: DeserializeOwned>(
    retry: &RetryConfig,
    operation: &str,
    request: RequestBuilder,
) -> Result<T> {
    let response = send(retry, operation, request).await?;
    Ok(response.json().await?)
}

async fn check_status(operation: &str, response: Response) -> Result<Response> {
    let status = response.status();
    debug!(operation, status = status.as_u16(), "Response received");

    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SyncError::Auth(format!(
            "{operation}: HTTP {status}"
        ))),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(60);
            Err(SyncError::RateLimited(retry_after))
        }
        status => {
            let body = response.text().await.unwrap_or_default();
            Err(SyncError::Status {
                operation: operation.to_string(),
                status: status.as_u16(),
                body,
            })
        }
    }
}
