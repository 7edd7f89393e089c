use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Biz-side point ledger for Japan/US creators. Only earnings and manual
/// adjustments land here; withdrawals live in `creator_withdrawal_requests`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = CreatorPoint)]
#[sea_orm(table_name = "creator_points")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub creator_id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub amount: i64,
    #[sea_orm(column_name = "type")]
    pub point_type: Option<String>,
    pub description: Option<String>,
    pub reason: Option<String>,
    pub status: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::featured_creators::Entity",
        from = "Column::CreatorId",
        to = "super::featured_creators::Column::Id"
    )]
    FeaturedCreator,
}

impl Related<super::featured_creators::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FeaturedCreator.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
