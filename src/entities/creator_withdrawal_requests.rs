use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = WithdrawalRequest)]
#[sea_orm(table_name = "creator_withdrawal_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub creator_id: Uuid,
    pub creator_name: Option<String>,
    pub region: Option<String>,
    pub requested_points: i64,
    pub requested_amount: Option<f64>,
    pub currency: Option<String>,
    pub tax_amount: Option<f64>,
    pub final_amount: Option<f64>,
    pub status: String,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub account_holder: Option<String>,
    #[serde(skip_serializing)]
    pub resident_registration_number: Option<String>,
    pub paypal_email: Option<String>,
    pub priority: Option<i32>,
    pub admin_notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub processed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
