use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{matches_search, unique_ids, ProfileIndex, SourceDb};
use crate::entities::{
    creator_points, creator_withdrawal_requests, featured_creators, point_transactions, user_profiles, withdrawals,
};
use crate::error::AppError;
use crate::region::{Region, RegionalDatabases};

/// Requests with the same creator, points and status this close together
/// are flagged as likely double submissions.
pub const DUPLICATE_WINDOW_SECS: i64 = 60;

/// Tolerated drift between the ledger sum and the cached balance.
const MISMATCH_TOLERANCE: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Processing,
    Completed,
    Rejected,
}

impl WithdrawalStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }

    /// Still holding points: not yet paid out and not refused.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Approved | Self::Processing)
    }
}

/// How a ledger relates to the withdrawals drawn against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BalanceFormula {
    /// Withdrawals are written into the ledger as negative rows (Korea).
    LedgerEmbedded,
    /// Withdrawals never touch the ledger (Biz).
    LedgerDetached,
}

impl BalanceFormula {
    pub fn for_source(source: SourceDb) -> Self {
        match source {
            SourceDb::Korea => Self::LedgerEmbedded,
            SourceDb::Biz => Self::LedgerDetached,
        }
    }

    /// Points the creator could draw for this request.
    ///
    /// `open_total` is the sum of every open request of the creator,
    /// including this one when it is open.
    pub fn available(&self, balance: i64, requested: i64, open: bool, open_total: i64) -> i64 {
        match self {
            Self::LedgerEmbedded if open => balance + requested,
            Self::LedgerEmbedded => balance,
            Self::LedgerDetached => {
                let others = if open { open_total - requested } else { open_total };
                balance - others
            }
        }
    }
}

/// A withdrawal request as read from either database.
#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawalRecord {
    pub id: Uuid,
    pub creator_id: Option<Uuid>,
    pub creator_name: Option<String>,
    pub requested_points: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<creator_withdrawal_requests::Model> for WithdrawalRecord {
    fn from(m: creator_withdrawal_requests::Model) -> Self {
        Self {
            id: m.id,
            creator_id: Some(m.creator_id),
            creator_name: m.creator_name,
            requested_points: m.requested_points,
            status: m.status,
            created_at: m.created_at,
        }
    }
}

impl From<withdrawals::Model> for WithdrawalRecord {
    fn from(m: withdrawals::Model) -> Self {
        Self {
            id: m.id,
            creator_id: m.user_id,
            creator_name: None,
            requested_points: m.amount.abs(),
            status: m.status,
            created_at: m.created_at,
        }
    }
}

/// Creator identity and the balance the application caches for them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreatorSnapshot {
    pub name: Option<String>,
    pub email: Option<String>,
    pub region: Option<String>,
    pub cached_balance: i64,
}

impl From<&featured_creators::Model> for CreatorSnapshot {
    fn from(c: &featured_creators::Model) -> Self {
        Self {
            name: c.display_name(),
            email: c.email.clone(),
            region: c.region.clone(),
            cached_balance: c.points_balance.unwrap_or(0),
        }
    }
}

impl From<&user_profiles::Model> for CreatorSnapshot {
    fn from(p: &user_profiles::Model) -> Self {
        Self {
            name: p.display_name(),
            email: p.email.clone(),
            region: Some(Region::Korea.as_str().to_string()),
            cached_balance: p.points.unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AuditRow {
    pub id: Uuid,
    pub creator_id: Option<Uuid>,
    pub creator_name: String,
    pub creator_email: Option<String>,
    pub creator_region: Option<String>,
    pub requested_points: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub actual_balance: i64,
    pub cached_balance: i64,
    pub available_balance: i64,
    pub balance_diff: i64,
    pub total_pending: i64,
    pub is_overpaid: bool,
    pub balance_mismatch: bool,
    pub is_duplicate: bool,
}

/// Cross-checks every request against the creator's ledger balance.
pub fn audit_withdrawals(
    withdrawals: &[WithdrawalRecord],
    balances: &HashMap<Uuid, i64>,
    directory: &HashMap<Uuid, CreatorSnapshot>,
    formula: BalanceFormula,
) -> Vec<AuditRow> {
    let mut open_totals: HashMap<Uuid, i64> = HashMap::new();
    for w in withdrawals {
        let open = WithdrawalStatus::parse(&w.status).is_some_and(|s| s.is_open());
        if let (true, Some(creator_id)) = (open, w.creator_id) {
            *open_totals.entry(creator_id).or_insert(0) += w.requested_points;
        }
    }

    let mut rows: Vec<AuditRow> = withdrawals
        .iter()
        .map(|w| {
            let open = WithdrawalStatus::parse(&w.status).is_some_and(|s| s.is_open());
            let snapshot = w.creator_id.and_then(|id| directory.get(&id));
            let actual_balance = w.creator_id.and_then(|id| balances.get(&id).copied()).unwrap_or(0);
            let cached_balance = snapshot.map(|s| s.cached_balance).unwrap_or(0);
            let total_pending = w.creator_id.and_then(|id| open_totals.get(&id).copied()).unwrap_or(0);
            let available_balance = formula.available(actual_balance, w.requested_points, open, total_pending);

            AuditRow {
                id: w.id,
                creator_id: w.creator_id,
                creator_name: snapshot
                    .and_then(|s| s.name.clone())
                    .or_else(|| w.creator_name.clone().filter(|n| !n.is_empty()))
                    .unwrap_or_else(|| "Unknown".to_string()),
                creator_email: snapshot.and_then(|s| s.email.clone()),
                creator_region: snapshot.and_then(|s| s.region.clone()),
                requested_points: w.requested_points,
                status: w.status.clone(),
                created_at: w.created_at,
                actual_balance,
                cached_balance,
                available_balance,
                balance_diff: available_balance - w.requested_points,
                total_pending,
                is_overpaid: open && w.requested_points > available_balance,
                balance_mismatch: (actual_balance - cached_balance).abs() > MISMATCH_TOLERANCE,
                is_duplicate: false,
            }
        })
        .collect();

    flag_duplicates(&mut rows);
    rows
}

/// Marks rows sharing creator, points and status within the duplicate window.
pub fn flag_duplicates(rows: &mut [AuditRow]) {
    let mut groups: HashMap<(Uuid, i64, String), Vec<usize>> = HashMap::new();
    for (idx, row) in rows.iter().enumerate() {
        if let Some(creator_id) = row.creator_id {
            groups
                .entry((creator_id, row.requested_points, row.status.clone()))
                .or_default()
                .push(idx);
        }
    }

    for mut members in groups.into_values().filter(|m| m.len() > 1) {
        members.sort_by_key(|&idx| rows[idx].created_at);
        for pair in members.windows(2) {
            let gap = rows[pair[1]].created_at - rows[pair[0]].created_at;
            if gap.num_seconds().abs() <= DUPLICATE_WINDOW_SECS {
                rows[pair[0]].is_duplicate = true;
                rows[pair[1]].is_duplicate = true;
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct AuditStats {
    pub total: usize,
    pub overpaid: usize,
    pub total_overpaid_amount: i64,
    pub pending: usize,
    pub approved: usize,
    pub completed: usize,
    pub mismatched: usize,
    pub duplicates: usize,
}

impl AuditStats {
    pub fn from_rows(rows: &[AuditRow]) -> Self {
        let mut stats = AuditStats {
            total: rows.len(),
            ..Default::default()
        };
        for row in rows {
            if row.is_overpaid {
                stats.overpaid += 1;
                stats.total_overpaid_amount += row.balance_diff.abs();
            }
            match WithdrawalStatus::parse(&row.status) {
                Some(WithdrawalStatus::Pending) => stats.pending += 1,
                Some(WithdrawalStatus::Approved | WithdrawalStatus::Processing) => stats.approved += 1,
                Some(WithdrawalStatus::Completed) => stats.completed += 1,
                _ => {}
            }
            if row.balance_mismatch {
                stats.mismatched += 1;
            }
            if row.is_duplicate {
                stats.duplicates += 1;
            }
        }
        stats
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AuditKind {
    #[default]
    All,
    Overpaid,
    Pending,
    Approved,
    Mismatch,
    Duplicate,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditFilter {
    /// all | overpaid | pending | approved | mismatch | duplicate
    #[serde(default)]
    #[param(required = false)]
    pub kind: AuditKind,
    /// Matches creator name, email or id
    #[param(required = false)]
    pub search: Option<String>,
    /// Restrict to one ledger (korea | biz)
    #[param(required = false)]
    pub source: Option<SourceDb>,
}

impl AuditFilter {
    pub fn matches(&self, row: &AuditRow) -> bool {
        let kind_ok = match self.kind {
            AuditKind::All => true,
            AuditKind::Overpaid => row.is_overpaid,
            AuditKind::Pending => row.status == "pending",
            AuditKind::Approved => matches!(row.status.as_str(), "approved" | "processing"),
            AuditKind::Mismatch => row.balance_mismatch,
            AuditKind::Duplicate => row.is_duplicate,
        };
        if !kind_ok {
            return false;
        }

        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(needle) => {
                let creator_id = row.creator_id.map(|id| id.to_string());
                matches_search(
                    needle,
                    [
                        Some(row.creator_name.as_str()),
                        row.creator_email.as_deref(),
                        creator_id.as_deref(),
                    ],
                )
            }
            None => true,
        }
    }

    pub fn apply(&self, rows: &[AuditRow]) -> Vec<AuditRow> {
        rows.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuditReport {
    pub source: SourceDb,
    pub formula: BalanceFormula,
    pub rows: Vec<AuditRow>,
    pub stats: AuditStats,
}

impl AuditReport {
    pub fn new(source: SourceDb, rows: Vec<AuditRow>) -> Self {
        let stats = AuditStats::from_rows(&rows);
        Self {
            source,
            formula: BalanceFormula::for_source(source),
            rows,
            stats,
        }
    }

    /// Same report restricted by the filter, stats recomputed.
    pub fn filtered(&self, filter: &AuditFilter) -> Self {
        Self::new(self.source, filter.apply(&self.rows))
    }
}

/// Biz requests checked against `creator_points`.
#[tracing::instrument(skip(db))]
pub async fn audit_biz(db: &DatabaseConnection) -> Result<AuditReport, AppError> {
    let requests = creator_withdrawal_requests::Entity::find()
        .filter(creator_withdrawal_requests::Column::Status.ne("rejected"))
        .order_by_desc(creator_withdrawal_requests::Column::CreatedAt)
        .all(db)
        .await?;

    let records: Vec<WithdrawalRecord> = requests.into_iter().map(WithdrawalRecord::from).collect();
    let creator_ids = unique_ids(records.iter().map(|r| r.creator_id));

    let mut balances = HashMap::new();
    let mut directory = HashMap::new();
    if !creator_ids.is_empty() {
        for point in creator_points::Entity::find()
            .filter(creator_points::Column::CreatorId.is_in(creator_ids.clone()))
            .all(db)
            .await?
        {
            *balances.entry(point.creator_id).or_insert(0) += point.amount;
        }

        for creator in featured_creators::Entity::find()
            .filter(featured_creators::Column::Id.is_in(creator_ids))
            .all(db)
            .await?
        {
            directory.insert(creator.id, CreatorSnapshot::from(&creator));
        }
    }

    let rows = audit_withdrawals(&records, &balances, &directory, BalanceFormula::LedgerDetached);
    tracing::info!("Audited {} Biz withdrawal requests", rows.len());
    Ok(AuditReport::new(SourceDb::Biz, rows))
}

/// Korea withdrawals checked against `point_transactions`.
#[tracing::instrument(skip(db))]
pub async fn audit_korea(db: &DatabaseConnection) -> Result<AuditReport, AppError> {
    let requests = withdrawals::Entity::find()
        .filter(withdrawals::Column::Status.ne("rejected"))
        .order_by_desc(withdrawals::Column::CreatedAt)
        .all(db)
        .await?;

    let records: Vec<WithdrawalRecord> = requests.into_iter().map(WithdrawalRecord::from).collect();
    let user_ids = unique_ids(records.iter().map(|r| r.creator_id));

    let mut balances = HashMap::new();
    let mut directory = HashMap::new();
    if !user_ids.is_empty() {
        for tx in point_transactions::Entity::find()
            .filter(point_transactions::Column::UserId.is_in(user_ids.clone()))
            .all(db)
            .await?
        {
            if let Some(user_id) = tx.user_id {
                *balances.entry(user_id).or_insert(0) += tx.amount;
            }
        }

        let profiles = ProfileIndex::build(
            user_profiles::Entity::find()
                .filter(
                    Condition::any()
                        .add(user_profiles::Column::Id.is_in(user_ids.clone()))
                        .add(user_profiles::Column::UserId.is_in(user_ids.clone())),
                )
                .all(db)
                .await?,
        );
        for user_id in &user_ids {
            if let Some(profile) = profiles.get(user_id) {
                directory.insert(*user_id, CreatorSnapshot::from(profile));
            }
        }
    }

    let rows = audit_withdrawals(&records, &balances, &directory, BalanceFormula::LedgerEmbedded);
    tracing::info!("Audited {} Korea withdrawals", rows.len());
    Ok(AuditReport::new(SourceDb::Korea, rows))
}

/// Reports for every configured ledger. Asking for one source explicitly
/// makes an unconfigured database an error instead of a skip.
pub async fn audit_all(dbs: &RegionalDatabases, only: Option<SourceDb>) -> Result<Vec<AuditReport>, AppError> {
    let mut reports = Vec::new();

    for source in [SourceDb::Biz, SourceDb::Korea] {
        if only.is_some_and(|wanted| wanted != source) {
            continue;
        }
        let region = match source {
            SourceDb::Biz => Region::Biz,
            SourceDb::Korea => Region::Korea,
        };
        let db = match only {
            Some(_) => dbs.get(region)?,
            None => match dbs.try_get(region) {
                Some(db) => db,
                None => {
                    tracing::warn!("{} database not configured; skipping audit", region);
                    continue;
                }
            },
        };

        let report = match source {
            SourceDb::Biz => audit_biz(db).await?,
            SourceDb::Korea => audit_korea(db).await?,
        };
        reports.push(report);
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn request(creator: Uuid, points: i64, status: &str, secs: i64) -> WithdrawalRecord {
        WithdrawalRecord {
            id: Uuid::new_v4(),
            creator_id: Some(creator),
            creator_name: Some("요청자".to_string()),
            requested_points: points,
            status: status.to_string(),
            created_at: at(secs),
        }
    }

    #[test]
    fn embedded_ledger_is_overpaid_only_when_balance_negative() {
        let creator = Uuid::new_v4();
        // 50k earned, 30k withdrawal already deducted
        let balances = HashMap::from([(creator, 20_000)]);
        let rows = audit_withdrawals(
            &[request(creator, 30_000, "pending", 0)],
            &balances,
            &HashMap::new(),
            BalanceFormula::LedgerEmbedded,
        );
        assert_eq!(rows[0].available_balance, 50_000);
        assert!(!rows[0].is_overpaid);

        let negative = HashMap::from([(creator, -5_000)]);
        let rows = audit_withdrawals(
            &[request(creator, 30_000, "pending", 0)],
            &negative,
            &HashMap::new(),
            BalanceFormula::LedgerEmbedded,
        );
        assert!(rows[0].is_overpaid);
        assert_eq!(rows[0].balance_diff, -5_000);
    }

    #[test]
    fn detached_ledger_subtracts_other_open_requests() {
        let creator = Uuid::new_v4();
        let balances = HashMap::from([(creator, 100_000)]);
        let requests = vec![
            request(creator, 60_000, "pending", 0),
            request(creator, 50_000, "approved", 3_600),
            request(creator, 90_000, "completed", 7_200),
        ];
        let rows = audit_withdrawals(&requests, &balances, &HashMap::new(), BalanceFormula::LedgerDetached);

        assert_eq!(rows[0].total_pending, 110_000);
        assert_eq!(rows[0].available_balance, 50_000);
        assert!(rows[0].is_overpaid);
        assert_eq!(rows[1].available_balance, 40_000);
        assert!(rows[1].is_overpaid);
        // closed requests are never overpaid
        assert!(!rows[2].is_overpaid);
    }

    #[test]
    fn mismatch_uses_cached_balance() {
        let creator = Uuid::new_v4();
        let balances = HashMap::from([(creator, 10_000)]);
        let directory = HashMap::from([(
            creator,
            CreatorSnapshot {
                name: Some("하루".to_string()),
                email: Some("haru@example.com".to_string()),
                region: Some("japan".to_string()),
                cached_balance: 12_000,
            },
        )]);
        let rows = audit_withdrawals(
            &[request(creator, 1_000, "completed", 0)],
            &balances,
            &directory,
            BalanceFormula::LedgerDetached,
        );
        assert!(rows[0].balance_mismatch);
        assert_eq!(rows[0].creator_name, "하루");
    }

    #[test]
    fn name_falls_back_to_request_then_unknown() {
        let creator = Uuid::new_v4();
        let mut anonymous = request(creator, 1_000, "pending", 0);
        anonymous.creator_name = None;
        let rows = audit_withdrawals(
            &[request(creator, 1_000, "pending", 0), anonymous],
            &HashMap::new(),
            &HashMap::new(),
            BalanceFormula::LedgerDetached,
        );
        assert_eq!(rows[0].creator_name, "요청자");
        assert_eq!(rows[1].creator_name, "Unknown");
    }

    #[test]
    fn duplicates_need_same_points_status_and_window() {
        let creator = Uuid::new_v4();
        let requests = vec![
            request(creator, 10_000, "pending", 0),
            request(creator, 10_000, "pending", 45),
            request(creator, 10_000, "pending", 600),
            request(creator, 20_000, "pending", 10),
        ];
        let rows = audit_withdrawals(&requests, &HashMap::new(), &HashMap::new(), BalanceFormula::LedgerDetached);
        let flags: Vec<bool> = rows.iter().map(|r| r.is_duplicate).collect();
        assert_eq!(flags, vec![true, true, false, false]);
    }

    #[test]
    fn stats_and_filters() {
        let creator = Uuid::new_v4();
        let balances = HashMap::from([(creator, 10_000)]);
        let requests = vec![
            request(creator, 30_000, "pending", 0),
            request(creator, 5_000, "processing", 3_600),
            request(creator, 5_000, "completed", 7_200),
        ];
        let rows = audit_withdrawals(&requests, &balances, &HashMap::new(), BalanceFormula::LedgerDetached);
        let stats = AuditStats::from_rows(&rows);

        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.approved, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.overpaid, 2);
        // pending: 10k - 5k = 5k available, diff -25k; processing: 10k - 30k = -20k, diff -25k
        assert_eq!(stats.total_overpaid_amount, 50_000);

        let approved = AuditFilter { kind: AuditKind::Approved, ..Default::default() };
        assert_eq!(approved.apply(&rows).len(), 1);

        let by_id = AuditFilter {
            search: Some(creator.to_string()[..8].to_uppercase()),
            ..Default::default()
        };
        assert_eq!(by_id.apply(&rows).len(), 3);
    }

    #[test]
    fn status_parsing() {
        assert_eq!(WithdrawalStatus::parse("Processing"), Some(WithdrawalStatus::Processing));
        assert!(WithdrawalStatus::Approved.is_open());
        assert!(!WithdrawalStatus::Completed.is_open());
        assert_eq!(WithdrawalStatus::parse("paid"), None);
    }
}
