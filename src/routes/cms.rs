use axum::extract::State;
use serde_json::Value;
use uuid::Uuid;

use super::{ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult, Deleted};
use crate::cms::{self, EmailTemplateUpdate, FaqQuery, FeaturedQuery, NewFaq, NewFeaturedCreator, SeoUpdate};
use crate::entities::{email_templates, faqs, featured_creators, page_contents, seo_settings, site_settings};
use crate::region::Region;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/cms/faqs",
    params(FaqQuery),
    responses((status = 200, description = "FAQs in display order", body = ApiResponse<Vec<faqs::Model>>))
)]
pub async fn list_faqs(State(state): State<AppState>, ApiQuery(query): ApiQuery<FaqQuery>) -> ApiResult<Vec<faqs::Model>> {
    Ok(ApiResponse::ok(cms::list_faqs(state.biz()?, query.include_inactive).await?))
}

#[utoipa::path(
    post,
    path = "/cms/faqs",
    request_body = NewFaq,
    responses(
        (status = 200, description = "Created", body = ApiResponse<faqs::Model>),
        (status = 400, description = "Missing question or answer")
    )
)]
pub async fn create_faq(State(state): State<AppState>, ApiJson(new): ApiJson<NewFaq>) -> ApiResult<faqs::Model> {
    Ok(ApiResponse::ok(cms::create_faq(state.biz()?, new).await?))
}

#[utoipa::path(
    put,
    path = "/cms/faqs/{id}",
    params(("id" = Uuid, Path, description = "FAQ id")),
    request_body = NewFaq,
    responses(
        (status = 200, description = "Updated", body = ApiResponse<faqs::Model>),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_faq(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(new): ApiJson<NewFaq>,
) -> ApiResult<faqs::Model> {
    Ok(ApiResponse::ok(cms::update_faq(state.biz()?, id, new).await?))
}

#[utoipa::path(
    delete,
    path = "/cms/faqs/{id}",
    params(("id" = Uuid, Path, description = "FAQ id")),
    responses(
        (status = 200, description = "Deleted", body = ApiResponse<Deleted>),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_faq(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Deleted> {
    cms::delete_faq(state.biz()?, id).await?;
    Ok(ApiResponse::ok(Deleted { deleted: true }))
}

#[utoipa::path(
    get,
    path = "/cms/pages/{key}",
    params(("key" = String, Path, description = "Page block key")),
    responses(
        (status = 200, description = "Page content", body = ApiResponse<page_contents::Model>),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_page(State(state): State<AppState>, ApiPath(key): ApiPath<String>) -> ApiResult<page_contents::Model> {
    Ok(ApiResponse::ok(cms::get_page(state.biz()?, &key).await?))
}

#[utoipa::path(
    put,
    path = "/cms/pages/{key}",
    params(("key" = String, Path, description = "Page block key")),
    request_body(content = Object, description = "Arbitrary JSON content"),
    responses((status = 200, description = "Saved", body = ApiResponse<page_contents::Model>))
)]
pub async fn put_page(
    State(state): State<AppState>,
    ApiPath(key): ApiPath<String>,
    ApiJson(content): ApiJson<Value>,
) -> ApiResult<page_contents::Model> {
    Ok(ApiResponse::ok(cms::upsert_page(state.biz()?, &key, content).await?))
}

#[utoipa::path(
    get,
    path = "/cms/settings/{key}",
    params(("key" = String, Path, description = "Setting key")),
    responses(
        (status = 200, description = "Setting", body = ApiResponse<site_settings::Model>),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_setting(State(state): State<AppState>, ApiPath(key): ApiPath<String>) -> ApiResult<site_settings::Model> {
    Ok(ApiResponse::ok(cms::get_setting(state.biz()?, &key).await?))
}

#[utoipa::path(
    put,
    path = "/cms/settings/{key}",
    params(("key" = String, Path, description = "Setting key")),
    request_body(content = Object, description = "Arbitrary JSON value"),
    responses((status = 200, description = "Saved", body = ApiResponse<site_settings::Model>))
)]
pub async fn put_setting(
    State(state): State<AppState>,
    ApiPath(key): ApiPath<String>,
    ApiJson(value): ApiJson<Value>,
) -> ApiResult<site_settings::Model> {
    Ok(ApiResponse::ok(cms::upsert_setting(state.biz()?, &key, value).await?))
}

#[utoipa::path(
    get,
    path = "/cms/seo/{path}",
    params(("path" = String, Path, description = "Page path without the leading slash")),
    responses(
        (status = 200, description = "SEO metadata", body = ApiResponse<seo_settings::Model>),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_seo(State(state): State<AppState>, ApiPath(path): ApiPath<String>) -> ApiResult<seo_settings::Model> {
    Ok(ApiResponse::ok(cms::get_seo(state.biz()?, &path).await?))
}

#[utoipa::path(
    put,
    path = "/cms/seo/{path}",
    params(("path" = String, Path, description = "Page path without the leading slash")),
    request_body = SeoUpdate,
    responses((status = 200, description = "Saved", body = ApiResponse<seo_settings::Model>))
)]
pub async fn put_seo(
    State(state): State<AppState>,
    ApiPath(path): ApiPath<String>,
    ApiJson(update): ApiJson<SeoUpdate>,
) -> ApiResult<seo_settings::Model> {
    Ok(ApiResponse::ok(cms::upsert_seo(state.biz()?, &path, update).await?))
}

#[utoipa::path(
    get,
    path = "/cms/email-templates/{key}",
    params(("key" = String, Path, description = "Template key")),
    responses(
        (status = 200, description = "Template", body = ApiResponse<email_templates::Model>),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_template(State(state): State<AppState>, ApiPath(key): ApiPath<String>) -> ApiResult<email_templates::Model> {
    Ok(ApiResponse::ok(cms::get_template(state.biz()?, &key).await?))
}

#[utoipa::path(
    put,
    path = "/cms/email-templates/{key}",
    params(("key" = String, Path, description = "Template key")),
    request_body = EmailTemplateUpdate,
    responses(
        (status = 200, description = "Saved", body = ApiResponse<email_templates::Model>),
        (status = 400, description = "Missing subject or body")
    )
)]
pub async fn put_template(
    State(state): State<AppState>,
    ApiPath(key): ApiPath<String>,
    ApiJson(update): ApiJson<EmailTemplateUpdate>,
) -> ApiResult<email_templates::Model> {
    Ok(ApiResponse::ok(cms::upsert_template(state.biz()?, &key, update).await?))
}

#[utoipa::path(
    get,
    path = "/cms/featured-creators",
    params(FeaturedQuery),
    responses((status = 200, description = "Showcased creators", body = ApiResponse<Vec<featured_creators::Model>>))
)]
pub async fn list_featured(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<FeaturedQuery>,
) -> ApiResult<Vec<featured_creators::Model>> {
    let region = query.region.as_deref().map(Region::parse);
    Ok(ApiResponse::ok(cms::list_featured(state.biz()?, region).await?))
}

#[utoipa::path(
    post,
    path = "/cms/featured-creators",
    request_body = NewFeaturedCreator,
    responses(
        (status = 200, description = "Created", body = ApiResponse<featured_creators::Model>),
        (status = 400, description = "Missing name")
    )
)]
pub async fn create_featured(
    State(state): State<AppState>,
    ApiJson(new): ApiJson<NewFeaturedCreator>,
) -> ApiResult<featured_creators::Model> {
    Ok(ApiResponse::ok(cms::create_featured(state.biz()?, new).await?))
}

#[utoipa::path(
    delete,
    path = "/cms/featured-creators/{id}",
    params(("id" = Uuid, Path, description = "Featured creator id")),
    responses(
        (status = 200, description = "Deleted", body = ApiResponse<Deleted>),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_featured(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Deleted> {
    cms::delete_featured(state.biz()?, id).await?;
    Ok(ApiResponse::ok(Deleted { deleted: true }))
}
