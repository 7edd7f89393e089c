pub mod applications;

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use sea_orm::{
    sea_query::{Alias, Expr, Query},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::entities::campaigns;
use crate::error::AppError;
use crate::region::{Region, RegionalDatabases};

pub const ALLOWED_STATUSES: [&str; 9] = [
    "draft",
    "pending",
    "pending_payment",
    "approved",
    "active",
    "paused",
    "completed",
    "rejected",
    "cancelled",
];

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct NewCampaign {
    pub title: String,
    pub brand: Option<String>,
    pub campaign_type: Option<String>,
    pub status: Option<String>,
    pub reward_points: Option<i64>,
    pub creator_points_override: Option<i64>,
    pub video_count: Option<i32>,
    pub estimated_cost: Option<f64>,
    pub company_email: Option<String>,
    pub application_deadline: Option<NaiveDate>,
}

impl NewCampaign {
    fn into_model(self) -> campaigns::Model {
        campaigns::Model {
            id: Uuid::new_v4(),
            title: self.title,
            brand: self.brand,
            status: self.status.unwrap_or_else(|| "draft".to_string()),
            campaign_type: self.campaign_type,
            reward_points: self.reward_points,
            creator_points_override: self.creator_points_override,
            video_count: self.video_count,
            estimated_cost: self.estimated_cost,
            payment_status: None,
            payment_confirmed_at: None,
            company_email: self.company_email,
            application_deadline: self.application_deadline,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateCampaignRequest {
    pub campaign: NewCampaign,
    pub regions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RegionInsertResult {
    pub region: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<campaigns::Model>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Inserts the same campaign into every selected region. Each region
/// succeeds or fails on its own.
#[tracing::instrument(skip(dbs, campaign))]
pub async fn create_in_regions(
    dbs: &RegionalDatabases,
    campaign: NewCampaign,
    regions: &[String],
) -> Result<Vec<RegionInsertResult>, AppError> {
    if campaign.title.trim().is_empty() {
        return Err(AppError::InvalidRequest("캠페인 제목이 필요합니다.".to_string()));
    }
    if regions.is_empty() {
        return Err(AppError::InvalidRequest("리전을 하나 이상 선택해주세요.".to_string()));
    }

    let mut results = Vec::with_capacity(regions.len());
    for name in regions {
        let region = Region::from_name(name).unwrap_or_else(|| {
            tracing::warn!("Unknown region {:?} in campaign request, using biz", name);
            Region::Biz
        });
        let Some(db) = dbs.try_get(region) else {
            results.push(RegionInsertResult {
                region: name.clone(),
                success: false,
                data: None,
                error: Some("Supabase client not configured for this region".to_string()),
            });
            continue;
        };

        let model = campaign.clone().into_model();
        let active = campaigns::ActiveModel::from(model.clone()).reset_all();
        match campaigns::Entity::insert(active).exec_without_returning(db).await {
            Ok(_) => {
                tracing::info!("Created campaign {} in {}", model.id, name);
                results.push(RegionInsertResult {
                    region: name.clone(),
                    success: true,
                    data: Some(model),
                    error: None,
                });
            }
            Err(e) => {
                tracing::error!(?e, "campaign insert failed in {}", name);
                results.push(RegionInsertResult {
                    region: name.clone(),
                    success: false,
                    data: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }
    Ok(results)
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub campaign_id: Option<Uuid>,
    pub region: Option<String>,
    pub new_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StatusChanged {
    pub campaign_id: Uuid,
    pub region: Region,
    pub status: String,
}

/// Sets a campaign's status. Only regions whose table has `updated_at` get it stamped.
#[tracing::instrument(skip(dbs))]
pub async fn update_status(dbs: &RegionalDatabases, change: StatusChange) -> Result<StatusChanged, AppError> {
    let campaign_id = change
        .campaign_id
        .ok_or_else(|| AppError::InvalidRequest("캠페인 ID가 필요합니다.".to_string()))?;
    let new_status = change
        .new_status
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::InvalidRequest("변경할 상태가 필요합니다.".to_string()))?;
    if !ALLOWED_STATUSES.contains(&new_status.as_str()) {
        return Err(AppError::InvalidRequest("유효하지 않은 상태값입니다.".to_string()));
    }

    let region = Region::parse(change.region.as_deref().unwrap_or("biz"));
    let db = dbs.get(region)?;

    let mut stmt = Query::update();
    stmt.table(campaigns::Entity)
        .value(campaigns::Column::Status, new_status.clone())
        .and_where(Expr::col(campaigns::Column::Id).eq(campaign_id));
    if region.tracks_updated_at() {
        stmt.value(Alias::new("updated_at"), Utc::now());
    }

    let result = db.execute(db.get_database_backend().build(&stmt)).await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("campaign {}", campaign_id)));
    }

    tracing::info!("Campaign {} in {} set to {}", campaign_id, region, new_status);
    Ok(StatusChanged {
        campaign_id,
        region,
        status: new_status,
    })
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CampaignQuery {
    /// Region name; defaults to biz
    #[param(required = false)]
    pub region: Option<String>,
    #[param(required = false)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CampaignListing {
    pub region: Region,
    pub campaigns: Vec<campaigns::Model>,
    pub by_status: BTreeMap<String, usize>,
}

pub async fn list_campaigns(dbs: &RegionalDatabases, query: &CampaignQuery) -> Result<CampaignListing, AppError> {
    let region = Region::parse(query.region.as_deref().unwrap_or("biz"));
    let db = dbs.get(region)?;

    let mut select = campaigns::Entity::find().order_by_desc(campaigns::Column::CreatedAt);
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        select = select.filter(campaigns::Column::Status.eq(status));
    }
    let campaigns = select.all(db).await?;

    let mut by_status = BTreeMap::new();
    for c in &campaigns {
        *by_status.entry(c.status.clone()).or_insert(0) += 1;
    }
    Ok(CampaignListing {
        region,
        campaigns,
        by_status,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RegionRevenue {
    pub region: Region,
    pub confirmed_campaigns: usize,
    pub revenue: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct RevenueOverview {
    pub regions: Vec<RegionRevenue>,
    pub total: f64,
    /// `YYYY-MM` of payment confirmation -> revenue
    pub monthly: BTreeMap<String, f64>,
}

/// Rolls up confirmed campaigns by region and by confirmation month.
pub fn summarize_revenue(per_region: Vec<(Region, Vec<campaigns::Model>)>) -> RevenueOverview {
    let mut overview = RevenueOverview::default();
    for (region, rows) in per_region {
        let confirmed: Vec<&campaigns::Model> = rows
            .iter()
            .filter(|c| c.payment_status.as_deref() == Some("confirmed"))
            .collect();
        let revenue: f64 = confirmed.iter().filter_map(|c| c.estimated_cost).sum();

        for c in &confirmed {
            if let (Some(at), Some(cost)) = (c.payment_confirmed_at, c.estimated_cost) {
                *overview.monthly.entry(at.format("%Y-%m").to_string()).or_insert(0.0) += cost;
            }
        }
        overview.total += revenue;
        overview.regions.push(RegionRevenue {
            region,
            confirmed_campaigns: confirmed.len(),
            revenue,
        });
    }
    overview
}

#[tracing::instrument(skip(dbs))]
pub async fn regional_revenue(dbs: &RegionalDatabases) -> Result<RevenueOverview, AppError> {
    let mut per_region = Vec::new();
    for region in Region::CAMPAIGN_REGIONS {
        let Some(db) = dbs.try_get(region) else {
            continue;
        };
        let rows = campaigns::Entity::find()
            .filter(campaigns::Column::PaymentStatus.eq("confirmed"))
            .all(db)
            .await?;
        per_region.push((region, rows));
    }
    Ok(summarize_revenue(per_region))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn confirmed(cost: f64, month: u32) -> campaigns::Model {
        campaigns::Model {
            id: Uuid::new_v4(),
            title: "캠페인".to_string(),
            brand: None,
            status: "active".to_string(),
            campaign_type: None,
            reward_points: None,
            creator_points_override: None,
            video_count: None,
            estimated_cost: Some(cost),
            payment_status: Some("confirmed".to_string()),
            payment_confirmed_at: Some(Utc.with_ymd_and_hms(2025, month, 3, 0, 0, 0).unwrap()),
            company_email: None,
            application_deadline: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn status_change_validates_input() {
        let dbs = RegionalDatabases::default();
        let missing_id = update_status(&dbs, StatusChange::default()).await.unwrap_err();
        assert_eq!(missing_id.to_string(), "캠페인 ID가 필요합니다.");

        let missing_status = update_status(
            &dbs,
            StatusChange {
                campaign_id: Some(Uuid::new_v4()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(missing_status.to_string(), "변경할 상태가 필요합니다.");

        let bogus = update_status(
            &dbs,
            StatusChange {
                campaign_id: Some(Uuid::new_v4()),
                new_status: Some("archived".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(bogus.to_string(), "유효하지 않은 상태값입니다.");
    }

    #[tokio::test]
    async fn status_change_reports_unconfigured_region() {
        let err = update_status(
            &RegionalDatabases::default(),
            StatusChange {
                campaign_id: Some(Uuid::new_v4()),
                region: Some("jp".to_string()),
                new_status: Some("active".to_string()),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "japan 리전의 Supabase 설정이 없습니다. 환경변수를 확인해주세요.");
    }

    #[tokio::test]
    async fn japan_update_leaves_updated_at_alone() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult { last_insert_id: 0, rows_affected: 1 }])
            .into_connection();
        let dbs = RegionalDatabases::from_connections([(Region::Japan, db)]);

        let changed = update_status(
            &dbs,
            StatusChange {
                campaign_id: Some(Uuid::new_v4()),
                region: Some("japan".to_string()),
                new_status: Some("paused".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(changed.region, Region::Japan);
        assert_eq!(changed.status, "paused");
    }

    #[tokio::test]
    async fn multi_region_insert_reports_each_region() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult { last_insert_id: 0, rows_affected: 1 }])
            .into_connection();
        let dbs = RegionalDatabases::from_connections([(Region::Japan, db)]);

        let results = create_in_regions(
            &dbs,
            NewCampaign {
                title: "Summer glow".to_string(),
                ..Default::default()
            },
            &["japan".to_string(), "taiwan".to_string()],
        )
        .await
        .unwrap();

        assert!(results[0].success);
        assert_eq!(results[0].data.as_ref().map(|c| c.status.as_str()), Some("draft"));
        assert!(!results[1].success);
        assert_eq!(
            results[1].error.as_deref(),
            Some("Supabase client not configured for this region")
        );
    }

    #[tokio::test]
    async fn unknown_region_name_lands_in_biz() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult { last_insert_id: 0, rows_affected: 1 }])
            .into_connection();
        let dbs = RegionalDatabases::from_connections([(Region::Biz, db)]);

        let results = create_in_regions(
            &dbs,
            NewCampaign {
                title: "Summer glow".to_string(),
                ..Default::default()
            },
            &["atlantis".to_string()],
        )
        .await
        .unwrap();

        assert_eq!(results[0].region, "atlantis");
        assert!(results[0].success);
    }

    #[test]
    fn revenue_rollup() {
        let mut unconfirmed = confirmed(999.0, 1);
        unconfirmed.payment_status = Some("pending".to_string());

        let overview = summarize_revenue(vec![
            (Region::Korea, vec![confirmed(1_000_000.0, 3), confirmed(500_000.0, 4), unconfirmed]),
            (Region::Japan, vec![confirmed(200_000.0, 3)]),
        ]);

        assert_eq!(overview.total, 1_700_000.0);
        assert_eq!(overview.regions[0].confirmed_campaigns, 2);
        assert_eq!(overview.monthly.get("2025-03"), Some(&1_200_000.0));
        assert_eq!(overview.monthly.get("2025-04"), Some(&500_000.0));
        assert!(!overview.monthly.contains_key("2025-01"));
    }
}
