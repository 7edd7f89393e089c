use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use utoipa::ToSchema;

use crate::entities::{creator_withdrawal_requests, withdrawals};
use crate::error::AppError;
use crate::kst;
use crate::ledger::{group_digits, SourceDb};
use crate::region::{Region, RegionalDatabases};

const REPORTED_STATUSES: [&str; 2] = ["pending", "approved"];
pub(crate) const RULE: &str = "━━━━━━━━━━━━━━━━━━━━";

/// Monday 00:00 through Sunday 23:59:59.999 of the previous KST week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportWindow {
    pub fn previous_week(now: DateTime<Utc>) -> Self {
        let local = now.with_timezone(&kst());
        let days_from_monday = local.weekday().num_days_from_monday() as i64;
        let last_monday = local.date_naive() - Duration::days(days_from_monday + 7);
        let start = kst()
            .from_local_datetime(&last_monday.and_time(NaiveTime::MIN))
            .single()
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or(now);
        let end = start + Duration::days(7) - Duration::milliseconds(1);
        Self { start, end }
    }

    fn label(&self) -> String {
        let start = self.start.with_timezone(&kst());
        let end = self.end.with_timezone(&kst());
        format!("{}/{} ~ {}/{}", start.month(), start.day(), end.month(), end.day())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ReportLine {
    pub source: SourceDb,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub gross: i64,
    pub income_tax: i64,
    pub resident_tax: i64,
    pub net: i64,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
}

impl ReportLine {
    pub fn new(
        source: SourceDb,
        created_at: DateTime<Utc>,
        name: Option<String>,
        gross: i64,
        bank_name: Option<String>,
        account_number: Option<String>,
    ) -> Self {
        let income_tax = (gross as f64 * 0.03).round() as i64;
        let resident_tax = (gross as f64 * 0.003).round() as i64;
        Self {
            source,
            created_at,
            name: name.filter(|n| !n.is_empty()).unwrap_or_else(|| "Unknown".to_string()),
            gross,
            income_tax,
            resident_tax,
            net: gross - income_tax - resident_tax,
            bank_name,
            account_number,
        }
    }

    fn render(&self) -> String {
        let local = self.created_at.with_timezone(&kst());
        format!(
            "{}/{} | {} | {}원 → {}원 | {} {}",
            local.month(),
            local.day(),
            self.name,
            group_digits(self.gross),
            group_digits(self.net),
            self.bank_name.as_deref().unwrap_or(""),
            self.account_number.as_deref().unwrap_or("")
        )
    }
}

impl From<creator_withdrawal_requests::Model> for ReportLine {
    fn from(w: creator_withdrawal_requests::Model) -> Self {
        let gross = w
            .requested_amount
            .map(|a| a.round() as i64)
            .unwrap_or(w.requested_points);
        ReportLine::new(SourceDb::Biz, w.created_at, w.account_holder, gross, w.bank_name, w.account_number)
    }
}

impl From<withdrawals::Model> for ReportLine {
    fn from(w: withdrawals::Model) -> Self {
        ReportLine::new(
            SourceDb::Korea,
            w.created_at,
            w.bank_account_holder,
            w.amount,
            w.bank_name,
            w.bank_account_number,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WeeklyReport {
    pub window: ReportWindow,
    pub lines: Vec<ReportLine>,
    pub total_gross: i64,
    pub total_net: i64,
}

impl WeeklyReport {
    pub fn new(window: ReportWindow, mut lines: Vec<ReportLine>) -> Self {
        lines.sort_by_key(|l| l.created_at);
        Self {
            window,
            total_gross: lines.iter().map(|l| l.gross).sum(),
            total_net: lines.iter().map(|l| l.net).sum(),
            lines,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn message(&self, sent_at: DateTime<Utc>) -> String {
        let details: Vec<String> = self.lines.iter().map(ReportLine::render).collect();
        format!(
            "📋 [주간 출금 신청 보고서]\n{RULE}\n📅 기간: {}\n📊 총 {}건\n💰 총 신청금액: {}원\n💸 실지급액: {}원\n   (세금 3.3% 공제)\n{RULE}\n📝 상세내역:\n{}\n{RULE}\n⏰ 발송시간: {}",
            self.window.label(),
            self.lines.len(),
            group_digits(self.total_gross),
            group_digits(self.total_net),
            details.join("\n"),
            sent_at.with_timezone(&kst()).format("%Y. %-m. %-d. %H:%M:%S"),
        )
    }
}

/// Pending and approved requests from both payout tables inside the window.
#[tracing::instrument(skip(dbs))]
pub async fn build_weekly_report(dbs: &RegionalDatabases, window: ReportWindow) -> Result<WeeklyReport, AppError> {
    let mut lines = Vec::new();

    match dbs.try_get(Region::Biz) {
        Some(db) => lines.extend(load_biz(db, window).await?),
        None => tracing::warn!("Biz database not configured; weekly report skips creator_withdrawal_requests"),
    }
    match dbs.try_get(Region::Korea) {
        Some(db) => lines.extend(load_korea(db, window).await?),
        None => tracing::warn!("Korea database not configured; weekly report skips withdrawals"),
    }

    tracing::info!("Report period {} ~ {}: {} requests", window.start, window.end, lines.len());
    Ok(WeeklyReport::new(window, lines))
}

async fn load_biz(db: &DatabaseConnection, window: ReportWindow) -> Result<Vec<ReportLine>, AppError> {
    Ok(creator_withdrawal_requests::Entity::find()
        .filter(creator_withdrawal_requests::Column::CreatedAt.gte(window.start))
        .filter(creator_withdrawal_requests::Column::CreatedAt.lte(window.end))
        .filter(creator_withdrawal_requests::Column::Status.is_in(REPORTED_STATUSES))
        .order_by_asc(creator_withdrawal_requests::Column::CreatedAt)
        .all(db)
        .await?
        .into_iter()
        .map(ReportLine::from)
        .collect())
}

async fn load_korea(db: &DatabaseConnection, window: ReportWindow) -> Result<Vec<ReportLine>, AppError> {
    Ok(withdrawals::Entity::find()
        .filter(withdrawals::Column::CreatedAt.gte(window.start))
        .filter(withdrawals::Column::CreatedAt.lte(window.end))
        .filter(withdrawals::Column::Status.is_in(REPORTED_STATUSES))
        .order_by_asc(withdrawals::Column::CreatedAt)
        .all(db)
        .await?
        .into_iter()
        .map(ReportLine::from)
        .collect())
}
