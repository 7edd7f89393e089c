use std::collections::HashMap;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{matches_search, unique_ids, ProfileIndex, SourceDb, UNKNOWN_CREATOR};
use crate::entities::{campaigns, creator_points, featured_creators, point_transactions, user_profiles};
use crate::error::AppError;
use crate::region::{Region, RegionalDatabases};

/// Transaction types shown in the Korea payout history.
pub const KOREA_HISTORY_TYPES: [&str; 5] = ["admin_add", "admin_deduct", "campaign_reward", "bonus", "refund"];

/// Rows read from each ledger per request.
pub const HISTORY_LIMIT: u64 = 500;

static CAMPAIGN_IN_DESCRIPTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)캠페인[명:\s]*([^\]]+)").expect("campaign title pattern is valid"));

/// A point movement normalised across both ledgers.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub creator_id: Option<Uuid>,
    pub amount: i64,
    pub transaction_type: String,
    pub description: Option<String>,
    pub campaign_id: Option<Uuid>,
    pub campaign_title: Option<String>,
    pub creator_name: String,
    pub creator_email: String,
    pub created_at: DateTime<Utc>,
    pub source: SourceDb,
}

impl LedgerEntry {
    pub fn from_korea(
        tx: point_transactions::Model,
        profiles: &ProfileIndex,
        campaign_titles: &HashMap<Uuid, String>,
    ) -> Self {
        let profile = tx.user_id.and_then(|id| profiles.get(&id));
        let campaign_title = tx
            .related_campaign_id
            .and_then(|id| campaign_titles.get(&id).cloned())
            .or_else(|| tx.description.as_deref().and_then(campaign_title_from_description));

        Self {
            id: tx.id,
            creator_id: tx.user_id,
            amount: tx.amount,
            transaction_type: tx.transaction_type,
            description: tx.description,
            campaign_id: tx.related_campaign_id,
            campaign_title,
            creator_name: profile
                .and_then(|p| p.display_name())
                .unwrap_or_else(|| UNKNOWN_CREATOR.to_string()),
            creator_email: profile.and_then(|p| p.email.clone()).unwrap_or_default(),
            created_at: tx.created_at,
            source: SourceDb::Korea,
        }
    }

    pub fn from_biz(point: creator_points::Model, creator: Option<&featured_creators::Model>) -> Self {
        Self {
            id: point.id,
            creator_id: Some(point.creator_id),
            amount: point.amount,
            transaction_type: point.point_type.unwrap_or_else(|| "campaign_reward".to_string()),
            description: point.description.or(point.reason),
            campaign_id: point.campaign_id,
            campaign_title: None,
            creator_name: creator
                .and_then(|c| c.display_name())
                .unwrap_or_else(|| UNKNOWN_CREATOR.to_string()),
            creator_email: creator.and_then(|c| c.email.clone()).unwrap_or_default(),
            created_at: point.created_at,
            source: SourceDb::Biz,
        }
    }

    pub fn is_campaign_related(&self) -> bool {
        matches!(self.transaction_type.as_str(), "campaign_reward" | "bonus") || self.campaign_id.is_some()
    }
}

/// Pulls a campaign name out of free-text descriptions like `[캠페인명: 여름 선크림]`.
pub fn campaign_title_from_description(description: &str) -> Option<String> {
    CAMPAIGN_IN_DESCRIPTION
        .captures(description)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|title| !title.is_empty())
}

/// Newest first.
pub fn merge_entries(mut korea: Vec<LedgerEntry>, biz: Vec<LedgerEntry>) -> Vec<LedgerEntry> {
    korea.extend(biz);
    korea.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    korea
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct PointStats {
    pub total_paid: i64,
    pub total_deducted: i64,
    pub campaign_rewards: i64,
    pub admin_add: i64,
}

impl PointStats {
    pub fn from_entries(entries: &[LedgerEntry]) -> Self {
        let mut stats = PointStats::default();
        for entry in entries {
            let amount = entry.amount.abs();
            if entry.amount > 0 {
                stats.total_paid += amount;
                match entry.transaction_type.as_str() {
                    "campaign_reward" | "bonus" => stats.campaign_rewards += amount,
                    "admin_add" => stats.admin_add += amount,
                    _ => {}
                }
            } else {
                stats.total_deducted += amount;
            }
        }
        stats
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    #[default]
    All,
    Add,
    Deduct,
    Campaign,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryFilter {
    /// all | add | deduct | campaign
    #[serde(default)]
    #[param(required = false)]
    pub kind: HistoryKind,
    /// Matches creator name, email, description or campaign title
    #[param(required = false)]
    pub search: Option<String>,
}

impl HistoryFilter {
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        let kind_ok = match self.kind {
            HistoryKind::All => true,
            HistoryKind::Add => entry.amount > 0,
            HistoryKind::Deduct => entry.amount < 0,
            HistoryKind::Campaign => entry.is_campaign_related(),
        };
        if !kind_ok {
            return false;
        }

        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(needle) => matches_search(
                needle,
                [
                    Some(entry.creator_name.as_str()),
                    Some(entry.creator_email.as_str()),
                    entry.description.as_deref(),
                    entry.campaign_title.as_deref(),
                ],
            ),
            None => true,
        }
    }

    pub fn apply(&self, entries: &[LedgerEntry]) -> Vec<LedgerEntry> {
        entries.iter().filter(|e| self.matches(e)).cloned().collect()
    }
}

/// Korea payout history: ledger rows plus creator and campaign lookups.
#[tracing::instrument(skip(db))]
pub async fn load_korea_entries(db: &DatabaseConnection) -> Result<Vec<LedgerEntry>, AppError> {
    let transactions = point_transactions::Entity::find()
        .filter(point_transactions::Column::TransactionType.is_in(KOREA_HISTORY_TYPES))
        .order_by_desc(point_transactions::Column::CreatedAt)
        .limit(HISTORY_LIMIT)
        .all(db)
        .await?;
    tracing::info!("Korea point_transactions: {} rows", transactions.len());

    let user_ids = unique_ids(transactions.iter().map(|t| t.user_id));
    let profiles = if user_ids.is_empty() {
        ProfileIndex::default()
    } else {
        let rows = user_profiles::Entity::find()
            .filter(
                Condition::any()
                    .add(user_profiles::Column::Id.is_in(user_ids.clone()))
                    .add(user_profiles::Column::UserId.is_in(user_ids)),
            )
            .all(db)
            .await?;
        ProfileIndex::build(rows)
    };

    let campaign_ids = unique_ids(transactions.iter().map(|t| t.related_campaign_id));
    let campaign_titles: HashMap<Uuid, String> = if campaign_ids.is_empty() {
        HashMap::new()
    } else {
        campaigns::Entity::find()
            .filter(campaigns::Column::Id.is_in(campaign_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c.title))
            .collect()
    };

    Ok(transactions
        .into_iter()
        .map(|tx| LedgerEntry::from_korea(tx, &profiles, &campaign_titles))
        .collect())
}

/// Biz ledger rows joined to the creator directory.
#[tracing::instrument(skip(db))]
pub async fn load_biz_entries(db: &DatabaseConnection) -> Result<Vec<LedgerEntry>, AppError> {
    let rows = creator_points::Entity::find()
        .find_also_related(featured_creators::Entity)
        .order_by_desc(creator_points::Column::CreatedAt)
        .limit(HISTORY_LIMIT)
        .all(db)
        .await?;
    tracing::info!("Biz creator_points: {} rows", rows.len());

    Ok(rows
        .into_iter()
        .map(|(point, creator)| LedgerEntry::from_biz(point, creator.as_ref()))
        .collect())
}

/// Combined history from every configured ledger, newest first.
pub async fn load_history(dbs: &RegionalDatabases) -> Result<Vec<LedgerEntry>, AppError> {
    let korea = match dbs.try_get(Region::Korea) {
        Some(db) => load_korea_entries(db).await?,
        None => {
            tracing::warn!("Korea database not configured; history limited to Biz ledger");
            Vec::new()
        }
    };
    let biz = match dbs.try_get(Region::Biz) {
        Some(db) => load_biz_entries(db).await?,
        None => {
            tracing::warn!("Biz database not configured; history limited to Korea ledger");
            Vec::new()
        }
    };
    Ok(merge_entries(korea, biz))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn entry(amount: i64, kind: &str, at: i64) -> LedgerEntry {
        LedgerEntry {
            id: Uuid::new_v4(),
            creator_id: None,
            amount,
            transaction_type: kind.to_string(),
            description: None,
            campaign_id: None,
            campaign_title: None,
            creator_name: UNKNOWN_CREATOR.to_string(),
            creator_email: String::new(),
            created_at: Utc.timestamp_opt(at, 0).unwrap(),
            source: SourceDb::Korea,
        }
    }

    #[test]
    fn extracts_campaign_from_description() {
        assert_eq!(
            campaign_title_from_description("[캠페인명: 여름 선크림 리뷰] 보상 지급").as_deref(),
            Some("여름 선크림 리뷰")
        );
        assert_eq!(
            campaign_title_from_description("캠페인: 올리브영 세일").as_deref(),
            Some("올리브영 세일")
        );
        assert_eq!(campaign_title_from_description("관리자 지급"), None);
    }

    #[test]
    fn stats_split_earnings_and_deductions() {
        let entries = vec![
            entry(10_000, "campaign_reward", 1),
            entry(2_000, "bonus", 2),
            entry(5_000, "admin_add", 3),
            entry(700, "refund", 4),
            entry(-3_000, "admin_deduct", 5),
        ];
        let stats = PointStats::from_entries(&entries);
        assert_eq!(stats.total_paid, 17_700);
        assert_eq!(stats.campaign_rewards, 12_000);
        assert_eq!(stats.admin_add, 5_000);
        assert_eq!(stats.total_deducted, 3_000);
    }

    #[test]
    fn merge_sorts_newest_first() {
        let merged = merge_entries(vec![entry(1, "bonus", 10), entry(1, "bonus", 30)], vec![entry(1, "bonus", 20)]);
        let times: Vec<i64> = merged.iter().map(|e| e.created_at.timestamp()).collect();
        assert_eq!(times, vec![30, 20, 10]);
    }

    #[test]
    fn filter_by_kind_and_search() {
        let mut reward = entry(5_000, "campaign_reward", 1);
        reward.creator_name = "Mina Beauty".to_string();
        let mut refund = entry(100, "refund", 2);
        refund.campaign_id = Some(Uuid::new_v4());
        let deduct = entry(-100, "admin_deduct", 3);
        let entries = vec![reward, refund, deduct];

        let campaign = HistoryFilter { kind: HistoryKind::Campaign, search: None };
        assert_eq!(campaign.apply(&entries).len(), 2);

        let deducted = HistoryFilter { kind: HistoryKind::Deduct, search: None };
        assert_eq!(deducted.apply(&entries).len(), 1);

        let search = HistoryFilter { kind: HistoryKind::All, search: Some("mina".into()) };
        let found = search.apply(&entries);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].creator_name, "Mina Beauty");
    }

    #[tokio::test]
    async fn korea_entries_resolve_profile_and_campaign() {
        let user_id = Uuid::new_v4();
        let campaign_id = Uuid::new_v4();
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![point_transactions::Model {
                id: Uuid::new_v4(),
                user_id: Some(user_id),
                amount: 30_000,
                transaction_type: "campaign_reward".to_string(),
                description: None,
                related_campaign_id: Some(campaign_id),
                created_at: at,
            }]])
            .append_query_results([vec![user_profiles::Model {
                id: Uuid::new_v4(),
                user_id: Some(user_id),
                name: Some("김하늘".to_string()),
                channel_name: Some("하늘TV".to_string()),
                email: Some("sky@example.com".to_string()),
                phone: None,
                points: Some(30_000),
            }]])
            .append_query_results([vec![campaigns::Model {
                id: campaign_id,
                title: "봄 쿠션 캠페인".to_string(),
                brand: None,
                status: "active".to_string(),
                campaign_type: None,
                reward_points: Some(30_000),
                creator_points_override: None,
                video_count: None,
                estimated_cost: None,
                payment_status: None,
                payment_confirmed_at: None,
                company_email: None,
                application_deadline: None,
                created_at: at,
            }]])
            .into_connection();

        let entries = load_korea_entries(&db).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].creator_name, "하늘TV");
        assert_eq!(entries[0].creator_email, "sky@example.com");
        assert_eq!(entries[0].campaign_title.as_deref(), Some("봄 쿠션 캠페인"));
        assert_eq!(entries[0].source, SourceDb::Korea);
    }
}
