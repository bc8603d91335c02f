//! Probe executor: issues one outbound request against a monitored endpoint
//! and classifies the outcome.
//!
//! `execute` never fails toward its caller; every failure mode (bad
//! configuration, decryption failure, transport error, timeout) comes back as
//! a classified [`ProbeOutcome`]. Persistence is the scheduler's job.
//!
//! Latency is measured as wall-clock time from request dispatch until the
//! response headers arrive. The body is read afterwards only to record the
//! response size; all recorded latencies are therefore comparable.

use std::time::{Duration, Instant};

use reqwest::{Client, Method};
use tracing::debug;

use crate::db::entities::{connection, monitor};
use crate::db::enums::CheckStatus;
use crate::db::services::connection_service;

#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub status: CheckStatus,
    pub http_status: Option<i32>,
    pub latency_ms: i64,
    pub response_size_bytes: Option<i64>,
    pub error_detail: Option<String>,
}

pub struct ProbeExecutor {
    client: Client,
    encryption_key_hex: String,
}

impl ProbeExecutor {
    pub fn new(encryption_key_hex: String) -> Result<Self, reqwest::Error> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            encryption_key_hex,
        })
    }

    /// Executes one probe. All failure modes are captured in the returned
    /// outcome; error details carry messages only, never credential material.
    pub async fn execute(
        &self,
        monitor: &monitor::Model,
        conn: &connection::Model,
    ) -> ProbeOutcome {
        let auth = match connection_service::decrypt_credentials(conn, &self.encryption_key_hex) {
            Ok(auth) => auth,
            Err(e) => {
                return error_outcome(format!("credential decryption failed: {e}"));
            }
        };

        let headers = match auth.build_auth_headers() {
            Ok(headers) => headers,
            Err(e) => return error_outcome(e.to_string()),
        };

        let method = match Method::from_bytes(monitor.method.as_bytes()) {
            Ok(method) => method,
            Err(_) => {
                return error_outcome(format!("invalid HTTP method '{}'", monitor.method));
            }
        };

        let url = join_url(&conn.base_url, &monitor.path);
        let timeout = Duration::from_secs(monitor.timeout_seconds.max(1) as u64);

        let dispatch = Instant::now();
        let response = self
            .client
            .request(method, &url)
            .headers(headers)
            .timeout(timeout)
            .send()
            .await;
        let latency_ms = dispatch.elapsed().as_millis() as i64;

        match response {
            Ok(response) => {
                let code = response.status().as_u16();
                let (status, error_detail) = classify_status(code, monitor.expected_status);

                // Body read only contributes the size; the latency above is
                // already final.
                let response_size_bytes = response.bytes().await.ok().map(|b| b.len() as i64);

                debug!(
                    monitor_id = monitor.id,
                    http_status = code,
                    latency_ms,
                    "Probe completed."
                );

                ProbeOutcome {
                    status,
                    http_status: Some(code as i32),
                    latency_ms,
                    response_size_bytes,
                    error_detail,
                }
            }
            Err(e) if e.is_timeout() => ProbeOutcome {
                status: CheckStatus::Timeout,
                http_status: None,
                latency_ms,
                response_size_bytes: None,
                error_detail: Some(format!(
                    "no response within {}s",
                    monitor.timeout_seconds.max(1)
                )),
            },
            Err(e) => ProbeOutcome {
                status: CheckStatus::Error,
                http_status: None,
                latency_ms,
                response_size_bytes: None,
                error_detail: Some(e.to_string()),
            },
        }
    }
}

fn error_outcome(detail: String) -> ProbeOutcome {
    ProbeOutcome {
        status: CheckStatus::Error,
        http_status: None,
        latency_ms: 0,
        response_size_bytes: None,
        error_detail: Some(detail),
    }
}

/// Status classification: SUCCESS requires a 2xx code that also matches the
/// monitor's expected status when one is configured; anything else is a
/// FAILURE with the code recorded.
pub fn classify_status(code: u16, expected_status: Option<i32>) -> (CheckStatus, Option<String>) {
    let is_2xx = (200..300).contains(&code);
    let matches_expected = expected_status.map(|e| e == code as i32).unwrap_or(true);

    if is_2xx && matches_expected {
        (CheckStatus::Success, None)
    } else {
        let detail = match expected_status {
            Some(expected) if code as i32 != expected => {
                Some(format!("expected status {expected}, got {code}"))
            }
            _ => Some(format!("unexpected status {code}")),
        };
        (CheckStatus::Failure, detail)
    }
}

/// Joins a connection base URL with a monitor path, tolerating stray slashes
/// on either side.
pub fn join_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if path.is_empty() {
        return base.to_string();
    }
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_2xx_is_success() {
        let (status, detail) = classify_status(200, None);
        assert_eq!(status, CheckStatus::Success);
        assert!(detail.is_none());

        let (status, _) = classify_status(204, None);
        assert_eq!(status, CheckStatus::Success);
    }

    #[test]
    fn test_5xx_is_failure_with_code() {
        let (status, detail) = classify_status(500, None);
        assert_eq!(status, CheckStatus::Failure);
        assert_eq!(detail.unwrap(), "unexpected status 500");
    }

    #[test]
    fn test_expected_status_must_match() {
        let (status, _) = classify_status(200, Some(200));
        assert_eq!(status, CheckStatus::Success);

        let (status, detail) = classify_status(200, Some(204));
        assert_eq!(status, CheckStatus::Failure);
        assert_eq!(detail.unwrap(), "expected status 204, got 200");
    }

    #[test]
    fn test_non_2xx_is_failure_even_when_expected() {
        // SUCCESS is reserved for 2xx; an expected 301 still classifies as
        // FAILURE with the mismatch recorded against the 2xx contract.
        let (status, _) = classify_status(301, Some(301));
        assert_eq!(status, CheckStatus::Failure);
    }

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://api.example.com", "/v1/health"),
            "https://api.example.com/v1/health"
        );
        assert_eq!(
            join_url("https://api.example.com/", "v1/health"),
            "https://api.example.com/v1/health"
        );
        assert_eq!(join_url("https://api.example.com/", ""), "https://api.example.com");
    }
}
