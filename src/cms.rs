//! Site content kept in the Biz database: FAQs, page blocks, settings, SEO
//! metadata, email templates and the featured creator showcase.

use std::collections::HashMap;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use sea_orm::{
    sea_query::OnConflict, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::entities::{email_templates, faqs, featured_creators, page_contents, seo_settings, site_settings};
use crate::error::AppError;
use crate::region::Region;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").unwrap());

// FAQs

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewFaq {
    pub question: String,
    pub answer: String,
    pub category: Option<String>,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl NewFaq {
    fn validate(&self) -> Result<(), AppError> {
        if self.question.trim().is_empty() || self.answer.trim().is_empty() {
            return Err(AppError::InvalidRequest("질문과 답변을 입력해주세요.".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct FaqQuery {
    /// Include hidden entries
    #[serde(default)]
    pub include_inactive: bool,
}

pub async fn list_faqs(db: &DatabaseConnection, include_inactive: bool) -> Result<Vec<faqs::Model>, AppError> {
    let mut query = faqs::Entity::find();
    if !include_inactive {
        query = query.filter(faqs::Column::IsActive.eq(true));
    }
    Ok(query.order_by_asc(faqs::Column::DisplayOrder).all(db).await?)
}

pub async fn create_faq(db: &DatabaseConnection, new: NewFaq) -> Result<faqs::Model, AppError> {
    new.validate()?;
    let faq = faqs::Model {
        id: Uuid::new_v4(),
        question: new.question.trim().to_string(),
        answer: new.answer.trim().to_string(),
        category: new.category,
        display_order: new.display_order,
        is_active: new.is_active,
    };
    faqs::Entity::insert(faqs::ActiveModel::from(faq.clone()).reset_all())
        .exec_without_returning(db)
        .await?;
    Ok(faq)
}

pub async fn update_faq(db: &DatabaseConnection, id: Uuid, new: NewFaq) -> Result<faqs::Model, AppError> {
    new.validate()?;
    let existing = faqs::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("faq {}", id)))?;

    let mut active: faqs::ActiveModel = existing.into();
    active.question = Set(new.question.trim().to_string());
    active.answer = Set(new.answer.trim().to_string());
    active.category = Set(new.category);
    active.display_order = Set(new.display_order);
    active.is_active = Set(new.is_active);
    Ok(active.update(db).await?)
}

pub async fn delete_faq(db: &DatabaseConnection, id: Uuid) -> Result<(), AppError> {
    let result = faqs::Entity::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound(format!("faq {}", id)));
    }
    Ok(())
}

// Page contents and site settings hold free-form JSON blocks.

pub async fn get_page(db: &DatabaseConnection, key: &str) -> Result<page_contents::Model, AppError> {
    page_contents::Entity::find_by_id(key.to_string())
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("page {}", key)))
}

#[tracing::instrument(skip(db, content))]
pub async fn upsert_page(
    db: &DatabaseConnection,
    key: &str,
    content: serde_json::Value,
) -> Result<page_contents::Model, AppError> {
    let page = page_contents::Model {
        page_key: key.to_string(),
        content,
        updated_at: Some(Utc::now()),
    };
    page_contents::Entity::insert(page_contents::ActiveModel::from(page.clone()).reset_all())
        .on_conflict(
            OnConflict::column(page_contents::Column::PageKey)
                .update_columns([page_contents::Column::Content, page_contents::Column::UpdatedAt])
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(page)
}

pub async fn get_setting(db: &DatabaseConnection, key: &str) -> Result<site_settings::Model, AppError> {
    site_settings::Entity::find_by_id(key.to_string())
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("setting {}", key)))
}

#[tracing::instrument(skip(db, value))]
pub async fn upsert_setting(
    db: &DatabaseConnection,
    key: &str,
    value: serde_json::Value,
) -> Result<site_settings::Model, AppError> {
    let setting = site_settings::Model {
        setting_key: key.to_string(),
        setting_value: value,
        updated_at: Some(Utc::now()),
    };
    site_settings::Entity::insert(site_settings::ActiveModel::from(setting.clone()).reset_all())
        .on_conflict(
            OnConflict::column(site_settings::Column::SettingKey)
                .update_columns([site_settings::Column::SettingValue, site_settings::Column::UpdatedAt])
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(setting)
}

// SEO

/// SEO rows are keyed by page path; `about` and `/about` are the same page.
pub fn normalize_page_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SeoUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub og_image: Option<String>,
}

pub async fn get_seo(db: &DatabaseConnection, path: &str) -> Result<seo_settings::Model, AppError> {
    let path = normalize_page_path(path);
    seo_settings::Entity::find_by_id(path.clone())
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("seo settings for {}", path)))
}

#[tracing::instrument(skip(db, update))]
pub async fn upsert_seo(db: &DatabaseConnection, path: &str, update: SeoUpdate) -> Result<seo_settings::Model, AppError> {
    let seo = seo_settings::Model {
        page_path: normalize_page_path(path),
        title: update.title,
        description: update.description,
        keywords: update.keywords,
        og_image: update.og_image,
        updated_at: Some(Utc::now()),
    };
    seo_settings::Entity::insert(seo_settings::ActiveModel::from(seo.clone()).reset_all())
        .on_conflict(
            OnConflict::column(seo_settings::Column::PagePath)
                .update_columns([
                    seo_settings::Column::Title,
                    seo_settings::Column::Description,
                    seo_settings::Column::Keywords,
                    seo_settings::Column::OgImage,
                    seo_settings::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(seo)
}

// Email templates

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct EmailTemplateUpdate {
    pub subject: String,
    pub html_body: String,
    pub text_body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: Option<String>,
}

/// Replaces `{{name}}` placeholders. Unknown names are left as written.
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

impl email_templates::Model {
    pub fn render(&self, vars: &HashMap<String, String>) -> RenderedEmail {
        RenderedEmail {
            subject: render(&self.subject, vars),
            html: render(&self.html_body, vars),
            text: self.text_body.as_deref().map(|t| render(t, vars)),
        }
    }
}

pub async fn get_template(db: &DatabaseConnection, key: &str) -> Result<email_templates::Model, AppError> {
    email_templates::Entity::find_by_id(key.to_string())
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("email template {}", key)))
}

#[tracing::instrument(skip(db, update))]
pub async fn upsert_template(
    db: &DatabaseConnection,
    key: &str,
    update: EmailTemplateUpdate,
) -> Result<email_templates::Model, AppError> {
    if update.subject.trim().is_empty() || update.html_body.trim().is_empty() {
        return Err(AppError::InvalidRequest("제목과 본문을 입력해주세요.".to_string()));
    }
    let template = email_templates::Model {
        template_key: key.to_string(),
        subject: update.subject,
        html_body: update.html_body,
        text_body: update.text_body,
        updated_at: Some(Utc::now()),
    };
    email_templates::Entity::insert(email_templates::ActiveModel::from(template.clone()).reset_all())
        .on_conflict(
            OnConflict::column(email_templates::Column::TemplateKey)
                .update_columns([
                    email_templates::Column::Subject,
                    email_templates::Column::HtmlBody,
                    email_templates::Column::TextBody,
                    email_templates::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(template)
}

// Featured creators

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct FeaturedQuery {
    pub region: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewFeaturedCreator {
    pub user_id: Option<Uuid>,
    pub name: Option<String>,
    pub channel_name: Option<String>,
    pub channel_url: Option<String>,
    pub email: Option<String>,
    pub region: String,
    pub subscriber_count: Option<i64>,
    pub display_order: Option<i32>,
    #[serde(default)]
    pub is_affiliated: bool,
}

pub async fn list_featured(db: &DatabaseConnection, region: Option<Region>) -> Result<Vec<featured_creators::Model>, AppError> {
    let mut query = featured_creators::Entity::find();
    if let Some(region) = region {
        query = query.filter(featured_creators::Column::Region.eq(region.as_str()));
    }
    Ok(query
        .order_by_asc(featured_creators::Column::DisplayOrder)
        .order_by_desc(featured_creators::Column::CreatedAt)
        .all(db)
        .await?)
}

#[tracing::instrument(skip(db, new))]
pub async fn create_featured(db: &DatabaseConnection, new: NewFeaturedCreator) -> Result<featured_creators::Model, AppError> {
    let has_name = [&new.name, &new.channel_name]
        .iter()
        .any(|n| n.as_deref().is_some_and(|s| !s.trim().is_empty()));
    if !has_name {
        return Err(AppError::InvalidRequest("크리에이터 이름 또는 채널명을 입력해주세요.".to_string()));
    }

    let creator = featured_creators::Model {
        id: Uuid::new_v4(),
        user_id: new.user_id,
        name: new.name,
        channel_name: new.channel_name,
        channel_url: new.channel_url,
        email: new.email,
        region: Some(Region::parse(&new.region).as_str().to_string()),
        points_balance: Some(0),
        is_affiliated: Some(new.is_affiliated),
        subscriber_count: new.subscriber_count,
        display_order: new.display_order,
        created_at: Utc::now(),
    };
    featured_creators::Entity::insert(featured_creators::ActiveModel::from(creator.clone()).reset_all())
        .exec_without_returning(db)
        .await?;
    Ok(creator)
}

pub async fn delete_featured(db: &DatabaseConnection, id: Uuid) -> Result<(), AppError> {
    let result = featured_creators::Entity::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound(format!("featured creator {}", id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn render_fills_known_placeholders() {
        let out = render(
            "{{creator_name}}님, {{ campaign_title }} 캠페인에 선정되었습니다. {{unknown}}",
            &vars(&[("creator_name", "김민지"), ("campaign_title", "봄 신상")]),
        );
        assert_eq!(out, "김민지님, 봄 신상 캠페인에 선정되었습니다. {{unknown}}");
    }

    #[test]
    fn template_renders_every_part() {
        let template = email_templates::Model {
            template_key: "campaign_selected".to_string(),
            subject: "[CNEC] {{campaign_title}} 선정 안내".to_string(),
            html_body: "<p>{{creator_name}}님 축하합니다</p>".to_string(),
            text_body: None,
            updated_at: None,
        };
        let rendered = template.render(&vars(&[("campaign_title", "여름 선크림"), ("creator_name", "박서준")]));
        assert_eq!(rendered.subject, "[CNEC] 여름 선크림 선정 안내");
        assert_eq!(rendered.html, "<p>박서준님 축하합니다</p>");
        assert_eq!(rendered.text, None);
    }

    #[test]
    fn page_paths_are_normalized() {
        assert_eq!(normalize_page_path("about"), "/about");
        assert_eq!(normalize_page_path("/"), "/");
    }

    #[tokio::test]
    async fn faq_requires_question_and_answer() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let err = create_faq(
            &db,
            NewFaq {
                question: "출금은 언제 되나요?".to_string(),
                answer: " ".to_string(),
                category: None,
                display_order: 0,
                is_active: true,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upserting_a_page_returns_the_stored_block() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult { last_insert_id: 0, rows_affected: 1 }])
            .into_connection();
        let page = upsert_page(&db, "home_hero", serde_json::json!({"headline": "브랜드와 크리에이터를 잇다"}))
            .await
            .unwrap();
        assert_eq!(page.page_key, "home_hero");
        assert_eq!(page.content["headline"], "브랜드와 크리에이터를 잇다");
    }

    #[tokio::test]
    async fn featured_creator_needs_a_name() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let err = create_featured(
            &db,
            NewFeaturedCreator {
                user_id: None,
                name: None,
                channel_name: Some("".to_string()),
                channel_url: None,
                email: None,
                region: "japan".to_string(),
                subscriber_count: None,
                display_order: None,
                is_affiliated: false,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }
}
