use chrono::{DateTime, Utc};
use reqwest::Client;

use super::post_to_webhook;
use crate::config::Config;
use crate::kst;
use crate::ledger::group_digits;
use crate::ledger::unpaid::{find_unpaid, UnpaidReport};
use crate::region::{Region, RegionalDatabases};
use crate::withdrawals::report::RULE;

const TOP_OVERDUE: usize = 10;

/// Webhook text for a scan. `None` when nothing is unpaid and no region failed.
pub fn unpaid_summary_message(report: &UnpaidReport, grace_days: i64, sent_at: DateTime<Utc>) -> Option<String> {
    let failures: Vec<String> = report
        .region_summary
        .values()
        .filter_map(|t| t.error.as_ref().map(|e| format!("❗ {} 조회 실패: {}", t.name, e)))
        .collect();
    if report.count == 0 && failures.is_empty() {
        return None;
    }

    let per_region: Vec<String> = Region::CREATOR_REGIONS
        .iter()
        .map(|r| {
            let n = report.summary.by_region.get(r.as_str()).copied().unwrap_or(0);
            format!("{} {}건", r.display_name(), n)
        })
        .collect();

    let mut overdue = report.overdue(grace_days);
    overdue.sort_by(|a, b| b.days_since_approval.cmp(&a.days_since_approval));
    let overdue_total = overdue.len();
    let top: Vec<String> = overdue
        .into_iter()
        .take(TOP_OVERDUE)
        .map(|i| {
            format!(
                "• [{}] {} / {} / {}P / {}일 - {}",
                i.region_name,
                i.creator_name,
                i.campaign_title,
                group_digits(i.reward_points),
                i.days_since_approval,
                i.reason
            )
        })
        .collect();

    let mut text = format!(
        "🔎 [미지급 포인트 점검]\n{RULE}\n📊 총 {}건 ({}일 이상 경과 {}건)\n🌏 리전별: {}\n",
        report.count,
        grace_days,
        overdue_total,
        per_region.join(", "),
    );
    if !failures.is_empty() {
        text.push_str(&failures.join("\n"));
        text.push('\n');
    }
    if !top.is_empty() {
        text.push_str(&format!("{RULE}\n⚠️ 지연 상위 {}건:\n{}\n", top.len(), top.join("\n")));
    }
    text.push_str(&format!(
        "{RULE}\n⏰ 점검시간: {}",
        sent_at.with_timezone(&kst()).format("%Y. %-m. %-d. %H:%M:%S")
    ));
    Some(text)
}

/// Daily scan for completed work with no matching point payment. The summary
/// goes to `REPORT_WEBHOOK_URL`; without one it is only logged.
#[tracing::instrument(skip_all)]
pub async fn run_unpaid_points_scan(config: &Config, dbs: &RegionalDatabases, http: &Client) -> anyhow::Result<()> {
    let now = Utc::now();
    let report = find_unpaid(dbs, now).await;

    for item in report.overdue(config.unpaid_grace_days) {
        tracing::warn!(
            region = %item.region,
            id = %item.id,
            creator = %item.creator_name,
            points = item.reward_points,
            days = item.days_since_approval,
            "{}",
            item.reason
        );
    }

    let Some(message) = unpaid_summary_message(&report, config.unpaid_grace_days, now) else {
        tracing::info!("Unpaid points scan found nothing");
        return Ok(());
    };
    let Some(webhook) = config.report_webhook_url.as_deref() else {
        tracing::warn!("REPORT_WEBHOOK_URL not set; unpaid summary not delivered\n{}", message);
        return Ok(());
    };

    post_to_webhook(http, webhook, &message).await?;
    tracing::info!(total = report.count, "Unpaid points summary sent");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{applications, campaigns, point_transactions, user_profiles, video_submissions};
    use crate::jobs::test_webhook;
    use axum::http::StatusCode;
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
    use uuid::Uuid;

    fn us_db_with_unpaid_application(days_ago: i64) -> DatabaseConnection {
        let user = Uuid::new_v4();
        let campaign_id = Uuid::new_v4();
        let now = Utc::now();
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<video_submissions::Model>::new()])
            .append_query_results([vec![applications::Model {
                id: Uuid::new_v4(),
                campaign_id,
                user_id: user,
                status: "completed".to_string(),
                created_at: now - Duration::days(days_ago + 10),
                updated_at: Some(now - Duration::days(days_ago)),
            }]])
            .append_query_results([vec![campaigns::Model {
                id: campaign_id,
                title: "Summer Glow".to_string(),
                brand: None,
                status: "active".to_string(),
                campaign_type: None,
                reward_points: Some(15_000),
                creator_points_override: None,
                video_count: None,
                estimated_cost: None,
                payment_status: None,
                payment_confirmed_at: None,
                company_email: None,
                application_deadline: None,
                created_at: now,
            }]])
            .append_query_results([vec![user_profiles::Model {
                id: user,
                user_id: None,
                name: Some("Emma".to_string()),
                channel_name: None,
                email: None,
                phone: None,
                points: Some(0),
            }]])
            .append_query_results([Vec::<point_transactions::Model>::new()])
            .into_connection()
    }

    fn config_with_webhook(url: String) -> Config {
        Config {
            report_webhook_url: Some(url),
            unpaid_grace_days: 3,
            ..Default::default()
        }
    }

    #[test]
    fn empty_report_has_no_message() {
        assert_eq!(unpaid_summary_message(&UnpaidReport::default(), 3, Utc::now()), None);
    }

    #[tokio::test]
    async fn scan_posts_summary_to_webhook() {
        let (url, received) = test_webhook::spawn(StatusCode::OK).await;
        let dbs = RegionalDatabases::from_connections([(Region::Us, us_db_with_unpaid_application(5))]);

        run_unpaid_points_scan(&config_with_webhook(url), &dbs, &Client::new())
            .await
            .unwrap();

        let bodies = received.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        let text = bodies[0]["text"].as_str().unwrap();
        assert!(text.contains("총 1건 (3일 이상 경과 1건)"));
        assert!(text.contains("미국 1건"));
        assert!(text.contains("[미국] Emma / Summer Glow / 15,000P / 5일"));
    }

    #[tokio::test]
    async fn webhook_failure_is_an_error() {
        let (url, _) = test_webhook::spawn(StatusCode::INTERNAL_SERVER_ERROR).await;
        let dbs = RegionalDatabases::from_connections([(Region::Us, us_db_with_unpaid_application(1))]);

        let result = run_unpaid_points_scan(&config_with_webhook(url), &dbs, &Client::new()).await;
        assert!(result.is_err());
    }
}
