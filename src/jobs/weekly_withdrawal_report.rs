use anyhow::Context;
use chrono::Utc;
use reqwest::Client;

use super::post_to_webhook;
use crate::config::Config;
use crate::region::RegionalDatabases;
use crate::withdrawals::report::{build_weekly_report, ReportWindow};

/// Builds last week's (KST) payout report and posts it to `REPORT_WEBHOOK_URL`.
/// Without a webhook the message is only logged.
#[tracing::instrument(skip_all)]
pub async fn run_weekly_withdrawal_report(
    config: &Config,
    dbs: &RegionalDatabases,
    http: &Client,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let window = ReportWindow::previous_week(now);
    let report = build_weekly_report(dbs, window)
        .await
        .context("failed to build weekly withdrawal report")?;

    if report.is_empty() {
        tracing::info!("No withdrawal requests between {} and {}", window.start, window.end);
        return Ok(());
    }

    let message = report.message(now);
    let Some(webhook) = config.report_webhook_url.as_deref() else {
        tracing::warn!("REPORT_WEBHOOK_URL not set; report not delivered\n{}", message);
        return Ok(());
    };

    post_to_webhook(http, webhook, &message).await?;

    tracing::info!("Weekly withdrawal report sent: {} requests", report.lines.len());
    Ok(())
}
