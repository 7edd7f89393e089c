use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Columns shared by every regional `campaigns` table. Region-specific
/// extras (localized titles, `updated_at`) are written through raw
/// statements instead of the entity.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = Campaign)]
#[sea_orm(table_name = "campaigns")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    pub brand: Option<String>,
    pub status: String,
    pub campaign_type: Option<String>,
    pub reward_points: Option<i64>,
    pub creator_points_override: Option<i64>,
    pub video_count: Option<i32>,
    pub estimated_cost: Option<f64>,
    pub payment_status: Option<String>,
    pub payment_confirmed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub company_email: Option<String>,
    pub application_deadline: Option<chrono::NaiveDate>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Points owed to a creator for completing this campaign.
    pub fn payout_points(&self) -> i64 {
        self.creator_points_override
            .filter(|p| *p > 0)
            .or(self.reward_points)
            .unwrap_or(0)
    }
}
