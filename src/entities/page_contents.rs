use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = PageContent)]
#[sea_orm(table_name = "page_contents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub page_key: String,
    #[sea_orm(column_type = "JsonBinary")]
    #[schema(value_type = Object)]
    pub content: Json,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
