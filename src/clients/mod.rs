//! Typed clients for the third-party services the back office calls.

pub mod gemini;
pub mod mailer;
pub mod youtube;

use std::time::Duration;

use backoff::{future::retry_notify, Error as BackoffError, ExponentialBackoff};
use reqwest::{Client, Response};

use crate::error::AppError;

pub use gemini::GeminiClient;
pub use mailer::{EmailMessage, Mailer};
pub use youtube::YouTubeClient;

const MAX_RETRY_ELAPSED: Duration = Duration::from_secs(30);

fn retry_notify_handler<E>(err: E, duration: Duration)
where
    E: std::fmt::Display,
{
    tracing::warn!(
        "Request failed: {}. Retrying in {:.1}s...",
        err,
        duration.as_secs_f32()
    );
}

/// GET with exponential backoff. 429 and 5xx responses and connection
/// failures are retried; other statuses fail at once.
pub(crate) async fn get_with_retry(client: &Client, url: &str, query: &[(&str, &str)]) -> Result<Response, AppError> {
    let backoff = ExponentialBackoff {
        max_elapsed_time: Some(MAX_RETRY_ELAPSED),
        ..Default::default()
    };

    retry_notify(
        backoff,
        || async {
            match client.get(url).query(query).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        Ok(resp)
                    } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        Err(BackoffError::transient(AppError::Upstream(format!(
                            "{} returned retryable status {}",
                            url, status
                        ))))
                    } else {
                        let body = resp.text().await.unwrap_or_default();
                        Err(BackoffError::permanent(AppError::Upstream(format!(
                            "{} returned {}: {}",
                            url, status, body
                        ))))
                    }
                }
                Err(err) if err.is_timeout() || err.is_connect() || err.is_request() => {
                    Err(BackoffError::transient(AppError::from(err)))
                }
                Err(err) => Err(BackoffError::permanent(AppError::from(err))),
            }
        },
        retry_notify_handler,
    )
    .await
}

/// Strips a surrounding markdown code fence (```json ... ```) from model output.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fences() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{}\n```  "), "{}");
        assert_eq!(strip_code_fence("  {\"b\":2} "), "{\"b\":2}");
    }
}
