//! Blocking bridge from synchronous tools into the async HTTP client.

use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use stepwise_core::{ExecutionResult, FailureReason};

/// Execute an async operation using the current runtime or creating a new one.
///
/// Tools run on the blocking pool, so blocking here does not stall the
/// runtime's worker threads. Runtime creation errors become failed results
/// instead of panics.
pub(crate) fn run_async<F, Fut>(f: F) -> ExecutionResult
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ExecutionResult>,
{
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        tokio::task::block_in_place(|| handle.block_on(f()))
    } else {
        match tokio::runtime::Runtime::new() {
            Ok(rt) => rt.block_on(f()),
            Err(e) => ExecutionResult::failure(format!("Failed to create async runtime: {}", e)),
        }
    }
}

pub(crate) fn client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("stepwise/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}

/// Send `request` and decode a JSON body; an empty body decodes to `null`.
pub(crate) async fn send_json(request: RequestBuilder, resource: &str) -> Result<Value, FailureReason> {
    let response = request.send().await.map_err(|e| FailureReason::NetworkError {
        message: e.to_string(),
    })?;
    let status = response.status();
    let body = response.text().await.map_err(|e| FailureReason::NetworkError {
        message: format!("Failed to read response body: {}", e),
    })?;

    if !status.is_success() {
        return Err(status_failure(status, resource, &body));
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(|e| FailureReason::InternalError {
        message: format!("{} returned invalid JSON: {}", resource, e),
    })
}

fn status_failure(status: StatusCode, resource: &str, body: &str) -> FailureReason {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FailureReason::PermissionDenied {
            message: format!("{} rejected the credentials ({})", resource, status),
        },
        StatusCode::NOT_FOUND => FailureReason::NotFound {
            resource: resource.to_string(),
        },
        StatusCode::BAD_REQUEST => FailureReason::InvalidInput {
            message: format!("{} rejected the request: {}", resource, snippet(body)),
        },
        _ => FailureReason::NetworkError {
            message: format!("{} returned {}: {}", resource, status, snippet(body)),
        },
    }
}

fn snippet(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
