use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::companies;
use crate::error::AppError;

/// Company onboarding form. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfileUpdate {
    pub user_id: Option<Uuid>,
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
}

fn set_if<T>(field: &mut ActiveValue<Option<T>>, value: Option<T>)
where
    Option<T>: Into<sea_orm::Value>,
{
    if let Some(v) = value {
        *field = Set(Some(v));
    }
}

pub async fn find_by_user(db: &DatabaseConnection, user_id: Uuid) -> Result<companies::Model, AppError> {
    companies::Entity::find()
        .filter(companies::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("company for user {}", user_id)))
}

/// Saves the form and marks the profile complete.
#[tracing::instrument(skip(db, update), fields(user_id = ?update.user_id))]
pub async fn update_profile(db: &DatabaseConnection, update: CompanyProfileUpdate) -> Result<companies::Model, AppError> {
    let user_id = update
        .user_id
        .ok_or_else(|| AppError::InvalidRequest("사용자 ID가 필요합니다.".to_string()))?;

    let company = find_by_user(db, user_id).await?;
    let now = Utc::now();

    let mut active: companies::ActiveModel = company.into();
    set_if(&mut active.company_name, update.company_name);
    set_if(&mut active.ceo_name, update.ceo_name);
    set_if(&mut active.business_type, update.business_type);
    set_if(&mut active.business_category, update.business_category);
    set_if(&mut active.company_postal_code, update.company_postal_code);
    set_if(&mut active.company_address, update.company_address);
    set_if(&mut active.notification_contact_person, update.notification_contact_person);
    set_if(&mut active.notification_email, update.notification_email);
    set_if(&mut active.notification_phone, update.notification_phone);
    set_if(&mut active.tax_invoice_email, update.tax_invoice_email);
    set_if(&mut active.tax_invoice_contact_person, update.tax_invoice_contact_person);
    set_if(&mut active.is_agency, update.is_agency);
    set_if(&mut active.email_notification_consent, update.email_notification_consent);
    set_if(&mut active.sms_notification_consent, update.sms_notification_consent);
    set_if(&mut active.marketing_consent, update.marketing_consent);
    active.consent_date = Set(Some(now));
    active.profile_completed = Set(Some(true));
    active.profile_completed_at = Set(Some(now));
    active.updated_at = Set(Some(now));

    let saved = active.update(db).await?;
    tracing::info!("Company profile {} updated", saved.id);
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn company(user_id: Uuid) -> companies::Model {
        companies::Model {
            id: Uuid::new_v4(),
            user_id,
            company_name: Some("하우랩".to_string()),
            ceo_name: None,
            business_type: None,
            business_category: None,
            company_postal_code: None,
            company_address: None,
            notification_contact_person: None,
            notification_email: None,
            notification_phone: None,
            tax_invoice_email: None,
            tax_invoice_contact_person: None,
            is_agency: None,
            email_notification_consent: None,
            sms_notification_consent: None,
            marketing_consent: None,
            consent_date: None,
            profile_completed: None,
            profile_completed_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn user_id_is_required() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let err = update_profile(&db, CompanyProfileUpdate::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "사용자 ID가 필요합니다.");
    }

    #[tokio::test]
    async fn missing_company_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<companies::Model>::new()])
            .into_connection();
        let err = update_profile(
            &db,
            CompanyProfileUpdate {
                user_id: Some(Uuid::new_v4()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn completes_profile() {
        let user_id = Uuid::new_v4();
        let stored = company(user_id);
        let mut saved = stored.clone();
        saved.ceo_name = Some("김대표".to_string());
        saved.profile_completed = Some(true);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![stored]])
            .append_query_results([vec![saved]])
            .into_connection();

        let result = update_profile(
            &db,
            CompanyProfileUpdate {
                user_id: Some(user_id),
                ceo_name: Some("김대표".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(result.profile_completed, Some(true));
        assert_eq!(result.ceo_name.as_deref(), Some("김대표"));
    }

    #[test]
    fn camel_case_body() {
        let body = r#"{"userId":"7f1c1f9e-4f7a-4d55-9a4e-2b8f5d0c9a11","companyName":"하우파파","isAgency":true}"#;
        let update: CompanyProfileUpdate = serde_json::from_str(body).unwrap();
        assert_eq!(update.company_name.as_deref(), Some("하우파파"));
        assert_eq!(update.is_agency, Some(true));
    }
}
