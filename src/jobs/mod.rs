//! Scheduled jobs run by `cnecbiz-worker`.

mod unpaid_points;
mod weekly_withdrawal_report;

pub use unpaid_points::{run_unpaid_points_scan, unpaid_summary_message};
pub use weekly_withdrawal_report::run_weekly_withdrawal_report;

use anyhow::{bail, Context};
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use reqwest::Client;
use serde_json::json;

/// Hour (UTC) on Mondays when the weekly payout report goes out.
pub const WEEKLY_REPORT_HOUR_UTC: u32 = 1;
/// Hour (UTC) of the daily unpaid-points scan.
pub const UNPAID_SCAN_HOUR_UTC: u32 = 0;

pub fn weekly_report_due(now: DateTime<Utc>) -> bool {
    now.weekday() == Weekday::Mon && now.hour() == WEEKLY_REPORT_HOUR_UTC
}

pub fn unpaid_scan_due(now: DateTime<Utc>) -> bool {
    now.hour() == UNPAID_SCAN_HOUR_UTC
}

/// Posts `{text}` to the report webhook. Non-2xx answers are errors.
pub(crate) async fn post_to_webhook(http: &Client, webhook: &str, text: &str) -> anyhow::Result<()> {
    let response = http
        .post(webhook)
        .json(&json!({ "text": text }))
        .send()
        .await
        .context("report webhook request failed")?;
    if !response.status().is_success() {
        bail!("report webhook returned {}", response.status());
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use chrono::TimeZone;

    #[test]
    fn weekly_report_runs_monday_0100_utc_only() {
        // 2025-01-06 was a Monday
        let monday = Utc.with_ymd_and_hms(2025, 1, 6, 1, 15, 0).unwrap();
        assert!(weekly_report_due(monday));
        assert!(!weekly_report_due(Utc.with_ymd_and_hms(2025, 1, 6, 2, 0, 0).unwrap()));
        assert!(!weekly_report_due(Utc.with_ymd_and_hms(2025, 1, 7, 1, 0, 0).unwrap()));
    }

    #[test]
    fn unpaid_scan_runs_at_midnight_hour() {
        assert!(unpaid_scan_due(Utc.with_ymd_and_hms(2025, 3, 4, 0, 59, 0).unwrap()));
        assert!(!unpaid_scan_due(Utc.with_ymd_and_hms(2025, 3, 4, 13, 0, 0).unwrap()));
    }

    #[tokio::test]
    async fn webhook_receives_text_payload() {
        let (url, received) = test_webhook::spawn(StatusCode::OK).await;
        post_to_webhook(&Client::new(), &url, "hello").await.unwrap();

        let bodies = received.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["text"], "hello");
    }

    #[tokio::test]
    async fn webhook_error_status_fails() {
        let (url, _) = test_webhook::spawn(StatusCode::BAD_GATEWAY).await;
        let err = post_to_webhook(&Client::new(), &url, "hello").await.unwrap_err();
        assert!(err.to_string().contains("502"));
    }
}
