use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = Company)]
#[sea_orm(table_name = "companies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_name: Option<String>,
    pub ceo_name: Option<String>,
    pub business_type: Option<String>,
    pub business_category: Option<String>,
    pub company_postal_code: Option<String>,
    pub company_address: Option<String>,
    pub notification_contact_person: Option<String>,
    pub notification_email: Option<String>,
    pub notification_phone: Option<String>,
    pub tax_invoice_email: Option<String>,
    pub tax_invoice_contact_person: Option<String>,
    pub is_agency: Option<bool>,
    pub email_notification_consent: Option<bool>,
    pub sms_notification_consent: Option<bool>,
    pub marketing_consent: Option<bool>,
    pub consent_date: Option<chrono::DateTime<chrono::Utc>>,
    pub profile_completed: Option<bool>,
    pub profile_completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
