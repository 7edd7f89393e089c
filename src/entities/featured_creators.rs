use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = FeaturedCreator)]
#[sea_orm(table_name = "featured_creators")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: Option<String>,
    pub channel_name: Option<String>,
    pub channel_url: Option<String>,
    pub email: Option<String>,
    pub region: Option<String>,
    /// Cached balance; the ledger in `creator_points` is authoritative.
    pub points_balance: Option<i64>,
    pub is_affiliated: Option<bool>,
    pub subscriber_count: Option<i64>,
    pub display_order: Option<i32>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::creator_points::Entity")]
    CreatorPoints,
}

impl Related<super::creator_points::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CreatorPoints.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn display_name(&self) -> Option<String> {
        self.channel_name
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| self.name.clone().filter(|s| !s.is_empty()))
    }
}
