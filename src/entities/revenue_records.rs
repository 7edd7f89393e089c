use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = RevenueRecord)]
#[sea_orm(table_name = "revenue_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub record_date: Option<chrono::NaiveDate>,
    /// `YYYY-MM`
    pub month: String,
    #[sea_orm(column_name = "type")]
    pub record_type: String,
    pub amount: f64,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tax_invoice_issued: Option<bool>,
    pub tax_invoice_number: Option<String>,
    pub tax_invoice_date: Option<chrono::NaiveDate>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
