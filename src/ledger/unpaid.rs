use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use sea_orm::{
    sea_query::{Expr, Func}, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{group_digits, unique_ids, ProfileIndex};
use crate::entities::{applications, campaigns, point_transactions, user_profiles, video_submissions};
use crate::error::AppError;
use crate::region::{Region, RegionalDatabases};

const VIDEO_SCAN_LIMIT: u64 = 500;
const APPLICATION_SCAN_LIMIT: u64 = 200;
const COUNTED_VIDEO_STATUSES: [&str; 3] = ["approved", "completed", "final_confirmed"];

pub const REASON_CAMPAIGN_MISSING: &str = "캠페인 정보 조회 실패";
pub const REASON_NO_REWARD: &str = "보상 포인트 미설정";
pub const REASON_NO_PROFILE: &str = "크리에이터 프로필 없음";
pub const REASON_UNKNOWN: &str = "원인 불명 - 수동 확인 필요";
pub const REASON_APPLICATION_UNPAID: &str = "completed 상태이나 point_transactions에 캠페인 지급 기록 없음";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UnpaidKind {
    Video,
    Application,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct UnpaidItem {
    #[serde(rename = "type")]
    pub kind: UnpaidKind,
    pub region: Region,
    pub region_name: String,
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub campaign_id: Option<Uuid>,
    pub application_id: Option<Uuid>,
    pub creator_name: String,
    pub creator_email: String,
    pub creator_phone: String,
    pub current_points: i64,
    pub campaign_title: String,
    pub campaign_type: Option<String>,
    pub reward_points: i64,
    pub approved_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub days_since_approval: i64,
    pub reason: String,
    pub video_url: Option<String>,
    pub is_multi_video: bool,
    pub required_count: usize,
    pub completed_count: usize,
}

impl UnpaidItem {
    fn sort_key(&self) -> Option<DateTime<Utc>> {
        self.approved_at.or(self.completed_at)
    }
}

/// Approved-or-better submissions a campaign needs before it pays out,
/// `None` for single-video campaigns.
pub fn required_videos(campaign: &campaigns::Model) -> Option<usize> {
    match campaign.campaign_type.as_deref() {
        Some("4week_challenge") => Some(4),
        Some("oliveyoung") | Some("oliveyoung_sale") => Some(2),
        _ => match campaign.video_count {
            Some(n) if n > 1 => Some(n as usize),
            _ => None,
        },
    }
}

fn append_reason(reason: &mut String, part: &str) {
    if !reason.is_empty() {
        reason.push_str(", ");
    }
    reason.push_str(part);
}

fn short_id(id: Option<Uuid>) -> String {
    id.map(|id| id.to_string()[..8].to_string()).unwrap_or_default()
}

fn whole_days(since: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    since.map(|t| (now - t).num_days()).unwrap_or(0)
}

/// Everything read from one regional database for a scan.
#[derive(Debug, Clone)]
pub struct RegionScan {
    pub region: Region,
    pub videos: Vec<video_submissions::Model>,
    pub applications: Vec<applications::Model>,
    pub campaigns: HashMap<Uuid, campaigns::Model>,
    pub profiles: ProfileIndex,
    /// Approved-or-better submissions per (user, campaign).
    pub approved_counts: HashMap<(Uuid, Uuid), usize>,
    /// (user, campaign) pairs that already have a linked ledger row.
    pub paid_pairs: HashSet<(Uuid, Uuid)>,
}

impl RegionScan {
    pub fn new(region: Region) -> Self {
        Self {
            region,
            videos: Vec::new(),
            applications: Vec::new(),
            campaigns: HashMap::new(),
            profiles: ProfileIndex::default(),
            approved_counts: HashMap::new(),
            paid_pairs: HashSet::new(),
        }
    }

    pub fn detect(&self, now: DateTime<Utc>) -> Vec<UnpaidItem> {
        let mut items = self.video_items(now);
        let covered: HashSet<(Option<Uuid>, Option<Uuid>)> =
            items.iter().map(|i| (i.user_id, i.campaign_id)).collect();

        for app in &self.applications {
            if self.paid_pairs.contains(&(app.user_id, app.campaign_id)) {
                continue;
            }
            if covered.contains(&(Some(app.user_id), Some(app.campaign_id))) {
                continue;
            }
            items.push(self.application_item(app, now));
        }
        items
    }

    fn video_items(&self, now: DateTime<Utc>) -> Vec<UnpaidItem> {
        let mut seen = HashSet::new();
        let mut items = Vec::new();

        for video in &self.videos {
            if !seen.insert((video.user_id, video.campaign_id)) {
                continue;
            }

            let profile = video.user_id.and_then(|id| self.profiles.get(&id));
            let mut item = self.blank_item(UnpaidKind::Video, video.id, video.user_id, video.campaign_id, profile);
            item.application_id = video.application_id;
            item.approved_at = video.approved_at;
            item.days_since_approval = whole_days(video.approved_at, now);
            item.video_url = video.video_url.clone();

            let Some(campaign) = video.campaign_id.and_then(|id| self.campaigns.get(&id)) else {
                item.reason = REASON_CAMPAIGN_MISSING.to_string();
                items.push(item);
                continue;
            };

            let mut reason = String::new();
            if let Some(required) = required_videos(campaign) {
                let completed = match (video.user_id, video.campaign_id) {
                    (Some(user), Some(campaign_id)) => self.approved_counts.get(&(user, campaign_id)).copied(),
                    _ => None,
                }
                .filter(|n| *n > 0)
                .unwrap_or(1);

                item.is_multi_video = true;
                item.required_count = required;
                item.completed_count = completed;
                if completed < required {
                    reason = format!("멀티비디오 미완성 ({}/{}개)", completed, required);
                }
            }

            let reward = campaign.payout_points();
            if reward == 0 {
                append_reason(&mut reason, REASON_NO_REWARD);
            }
            if profile.is_none() {
                append_reason(&mut reason, REASON_NO_PROFILE);
            }
            if reason.is_empty() {
                reason = REASON_UNKNOWN.to_string();
            }

            item.campaign_title = campaign.title.clone();
            item.campaign_type = campaign.campaign_type.clone();
            item.reward_points = reward;
            item.reason = reason;
            items.push(item);
        }
        items
    }

    fn application_item(&self, app: &applications::Model, now: DateTime<Utc>) -> UnpaidItem {
        let profile = self.profiles.get(&app.user_id);
        let campaign = self.campaigns.get(&app.campaign_id);
        let reward = campaign.map(|c| c.payout_points()).unwrap_or(0);

        let mut reason = REASON_APPLICATION_UNPAID.to_string();
        if campaign.is_none() {
            append_reason(&mut reason, "캠페인 정보 없음");
        }
        if reward == 0 {
            append_reason(&mut reason, REASON_NO_REWARD);
        }
        if profile.is_none() {
            append_reason(&mut reason, REASON_NO_PROFILE);
        }

        let mut item = self.blank_item(
            UnpaidKind::Application,
            app.id,
            Some(app.user_id),
            Some(app.campaign_id),
            profile,
        );
        if let Some(campaign) = campaign {
            item.campaign_title = campaign.title.clone();
            item.campaign_type = campaign.campaign_type.clone();
        }
        item.application_id = Some(app.id);
        item.reward_points = reward;
        item.completed_at = app.updated_at;
        item.days_since_approval = whole_days(app.updated_at, now);
        item.reason = reason;
        item
    }

    fn blank_item(
        &self,
        kind: UnpaidKind,
        id: Uuid,
        user_id: Option<Uuid>,
        campaign_id: Option<Uuid>,
        profile: Option<&user_profiles::Model>,
    ) -> UnpaidItem {
        UnpaidItem {
            kind,
            region: self.region,
            region_name: self.region.display_name().to_string(),
            id,
            user_id,
            campaign_id,
            application_id: None,
            creator_name: profile
                .and_then(|p| p.display_name())
                .unwrap_or_else(|| short_id(user_id)),
            creator_email: profile.and_then(|p| p.email.clone()).unwrap_or_default(),
            creator_phone: profile.and_then(|p| p.phone.clone()).unwrap_or_default(),
            current_points: profile.and_then(|p| p.points).unwrap_or(0),
            campaign_title: "캠페인 정보 없음".to_string(),
            campaign_type: None,
            reward_points: 0,
            approved_at: None,
            completed_at: None,
            days_since_approval: 0,
            reason: String::new(),
            video_url: None,
            is_multi_video: false,
            required_count: 1,
            completed_count: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct RegionTally {
    pub name: String,
    pub videos: usize,
    pub applications: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct UnpaidSummary {
    pub total: usize,
    pub multi_video_incomplete: usize,
    pub no_reward_points: usize,
    pub no_profile: usize,
    pub no_campaign: usize,
    pub unknown: usize,
    pub by_region: BTreeMap<String, usize>,
}

impl UnpaidSummary {
    pub fn from_items(items: &[UnpaidItem]) -> Self {
        let count = |needle: &str| items.iter().filter(|i| i.reason.contains(needle)).count();
        let mut by_region: BTreeMap<String, usize> = Region::CREATOR_REGIONS
            .iter()
            .map(|r| (r.as_str().to_string(), 0))
            .collect();
        for item in items {
            *by_region.entry(item.region.as_str().to_string()).or_insert(0) += 1;
        }

        Self {
            total: items.len(),
            multi_video_incomplete: count("멀티비디오"),
            no_reward_points: count("보상 포인트"),
            no_profile: count("프로필"),
            no_campaign: count("캠페인 정보"),
            unknown: count("원인 불명"),
            by_region,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct UnpaidReport {
    pub unpaid_items: Vec<UnpaidItem>,
    pub count: usize,
    pub region_summary: BTreeMap<String, RegionTally>,
    pub summary: UnpaidSummary,
}

impl UnpaidReport {
    /// Oldest approval first; items without a date lead.
    pub fn from_items(mut items: Vec<UnpaidItem>, region_summary: BTreeMap<String, RegionTally>) -> Self {
        items.sort_by_key(|i| i.sort_key());
        let summary = UnpaidSummary::from_items(&items);
        Self {
            count: items.len(),
            unpaid_items: items,
            region_summary,
            summary,
        }
    }

    /// Items waiting at least `grace_days` since approval or completion.
    pub fn overdue(&self, grace_days: i64) -> Vec<&UnpaidItem> {
        self.unpaid_items
            .iter()
            .filter(|i| i.days_since_approval >= grace_days)
            .collect()
    }
}

/// Campaigns by id from the region database, then Biz for the rest.
async fn load_campaigns(
    region_db: &DatabaseConnection,
    biz_db: Option<&DatabaseConnection>,
    ids: Vec<Uuid>,
) -> Result<HashMap<Uuid, campaigns::Model>, DbErr> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut found: HashMap<Uuid, campaigns::Model> = campaigns::Entity::find()
        .filter(campaigns::Column::Id.is_in(ids.clone()))
        .all(region_db)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    let missing: Vec<Uuid> = ids.into_iter().filter(|id| !found.contains_key(id)).collect();
    if let (false, Some(biz)) = (missing.is_empty(), biz_db) {
        for campaign in campaigns::Entity::find()
            .filter(campaigns::Column::Id.is_in(missing))
            .all(biz)
            .await?
        {
            found.insert(campaign.id, campaign);
        }
    }
    Ok(found)
}

/// Reads what the detector needs from one creator region.
#[tracing::instrument(skip(region_db, biz_db))]
pub async fn scan_region(
    region_db: &DatabaseConnection,
    biz_db: Option<&DatabaseConnection>,
    region: Region,
) -> Result<RegionScan, AppError> {
    let mut scan = RegionScan::new(region);

    scan.videos = video_submissions::Entity::find()
        .filter(video_submissions::Column::Status.eq("approved"))
        .filter(video_submissions::Column::FinalConfirmedAt.is_null())
        .order_by_asc(video_submissions::Column::ApprovedAt)
        .limit(VIDEO_SCAN_LIMIT)
        .all(region_db)
        .await?;

    scan.applications = applications::Entity::find()
        .filter(applications::Column::Status.eq("completed"))
        .order_by_desc(applications::Column::UpdatedAt)
        .limit(APPLICATION_SCAN_LIMIT)
        .all(region_db)
        .await?;

    tracing::info!(
        "{} region: {} approved videos, {} completed applications",
        region.display_name(),
        scan.videos.len(),
        scan.applications.len()
    );

    let campaign_ids = unique_ids(
        scan.videos
            .iter()
            .map(|v| v.campaign_id)
            .chain(scan.applications.iter().map(|a| Some(a.campaign_id))),
    );
    scan.campaigns = load_campaigns(region_db, biz_db, campaign_ids).await?;

    let user_ids = unique_ids(
        scan.videos
            .iter()
            .map(|v| v.user_id)
            .chain(scan.applications.iter().map(|a| Some(a.user_id))),
    );
    if !user_ids.is_empty() {
        scan.profiles = ProfileIndex::build(
            user_profiles::Entity::find()
                .filter(
                    Condition::any()
                        .add(user_profiles::Column::Id.is_in(user_ids.clone()))
                        .add(user_profiles::Column::UserId.is_in(user_ids.clone())),
                )
                .all(region_db)
                .await?,
        );
    }

    let multi_campaigns: Vec<Uuid> = scan
        .campaigns
        .values()
        .filter(|c| required_videos(c).is_some())
        .map(|c| c.id)
        .collect();
    let video_users = unique_ids(scan.videos.iter().map(|v| v.user_id));
    if !multi_campaigns.is_empty() && !video_users.is_empty() {
        for submission in video_submissions::Entity::find()
            .filter(video_submissions::Column::CampaignId.is_in(multi_campaigns))
            .filter(video_submissions::Column::UserId.is_in(video_users))
            .filter(video_submissions::Column::Status.is_in(COUNTED_VIDEO_STATUSES))
            .all(region_db)
            .await?
        {
            if let (Some(user), Some(campaign)) = (submission.user_id, submission.campaign_id) {
                *scan.approved_counts.entry((user, campaign)).or_insert(0) += 1;
            }
        }
    }

    let app_users = unique_ids(scan.applications.iter().map(|a| Some(a.user_id)));
    if !app_users.is_empty() {
        for tx in point_transactions::Entity::find()
            .filter(point_transactions::Column::UserId.is_in(app_users))
            .filter(point_transactions::Column::RelatedCampaignId.is_not_null())
            .all(region_db)
            .await?
        {
            if let (Some(user), Some(campaign)) = (tx.user_id, tx.related_campaign_id) {
                scan.paid_pairs.insert((user, campaign));
            }
        }
    }

    Ok(scan)
}

/// Scans every configured creator region. A failing region is reported in
/// its tally and does not stop the others.
pub async fn find_unpaid(dbs: &RegionalDatabases, now: DateTime<Utc>) -> UnpaidReport {
    let biz_db = dbs.try_get(Region::Biz);

    let configured: Vec<(Region, &DatabaseConnection)> = Region::CREATOR_REGIONS
        .into_iter()
        .filter_map(|region| match dbs.try_get(region) {
            Some(db) => Some((region, db)),
            None => {
                tracing::info!("{} DB not configured, skipping", region.display_name());
                None
            }
        })
        .collect();

    let scans = join_all(
        configured
            .iter()
            .map(|(region, db)| async move { (*region, scan_region(db, biz_db, *region).await) }),
    )
    .await;

    let mut items = Vec::new();
    let mut tallies = BTreeMap::new();
    for (region, result) in scans {
        let mut tally = RegionTally {
            name: region.display_name().to_string(),
            ..Default::default()
        };
        match result {
            Ok(scan) => {
                let found = scan.detect(now);
                tally.videos = scan.videos.len();
                tally.applications = found.iter().filter(|i| i.kind == UnpaidKind::Application).count();
                items.extend(found);
            }
            Err(e) => {
                tracing::error!(error = %e, "{} region scan failed", region.display_name());
                tally.error = Some(e.to_string());
            }
        }
        tallies.insert(region.as_str().to_string(), tally);
    }

    let report = UnpaidReport::from_items(items, tallies);
    tracing::info!("Total unpaid items: {}", report.count);
    report
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManualPayRequest {
    pub region: Option<String>,
    pub user_id: Option<Uuid>,
    pub amount: Option<i64>,
    pub campaign_id: Option<Uuid>,
    pub video_id: Option<Uuid>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ManualPayOutcome {
    pub message: String,
    pub new_balance: i64,
}

/// Credits a creator by hand and closes out the video that was stuck.
#[tracing::instrument(skip(dbs))]
pub async fn manual_pay(dbs: &RegionalDatabases, req: ManualPayRequest) -> Result<ManualPayOutcome, AppError> {
    let (Some(user_id), Some(amount)) = (req.user_id, req.amount.filter(|a| *a > 0)) else {
        return Err(AppError::InvalidRequest("userId와 amount가 필요합니다.".to_string()));
    };

    let region_name = req.region.as_deref().unwrap_or("korea");
    let region = Region::parse(region_name);
    let db = match dbs.try_get(region) {
        Some(db) if Region::CREATOR_REGIONS.contains(&region) => db,
        _ => {
            return Err(AppError::InvalidRequest(format!(
                "{} 리전 DB를 찾을 수 없습니다.",
                region_name
            )))
        }
    };

    let txn = db.begin().await?;

    let profile = user_profiles::Entity::find_by_id(user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::InvalidRequest("크리에이터 프로필을 찾을 수 없습니다.".to_string()))?;
    let new_balance = profile.points.unwrap_or(0) + amount;
    let now = Utc::now();

    user_profiles::Entity::update_many()
        .col_expr(
            user_profiles::Column::Points,
            Expr::expr(Func::coalesce([Expr::col(user_profiles::Column::Points).into(), Expr::value(0i64)]))
                .add(amount),
        )
        .filter(user_profiles::Column::Id.eq(user_id))
        .exec(&txn)
        .await?;

    point_transactions::Entity::insert(point_transactions::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(Some(user_id)),
        amount: Set(amount),
        transaction_type: Set("campaign_payment".to_string()),
        description: Set(Some(
            req.reason
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| "수동 포인트 지급 (미지급 건 처리)".to_string()),
        )),
        related_campaign_id: Set(req.campaign_id),
        created_at: Set(now),
    })
    .exec_without_returning(&txn)
    .await?;

    if let Some(video_id) = req.video_id {
        video_submissions::Entity::update_many()
            .col_expr(video_submissions::Column::Status, Expr::value("completed"))
            .col_expr(video_submissions::Column::FinalConfirmedAt, Expr::value(now))
            .filter(video_submissions::Column::Id.eq(video_id))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;

    tracing::info!(
        "Manual pay ({}): user={}, amount={}, new_balance={}",
        region.display_name(),
        user_id,
        amount,
        new_balance
    );

    let name = profile.display_name().unwrap_or_else(|| short_id(Some(user_id)));
    Ok(ManualPayOutcome {
        message: format!(
            "{}님에게 {}P 지급 완료 ({})",
            name,
            group_digits(amount),
            region.display_name()
        ),
        new_balance,
    })
}
