use axum::extract::State;
use uuid::Uuid;

use super::{ApiJson, ApiPath, ApiResponse, ApiResult};
use crate::companies::{self, CompanyProfileUpdate};
use crate::entities::companies as company;
use crate::AppState;

#[utoipa::path(
    post,
    path = "/functions/update-company-profile",
    request_body = CompanyProfileUpdate,
    responses(
        (status = 200, description = "Profile saved and marked complete", body = ApiResponse<company::Model>),
        (status = 400, description = "Missing userId"),
        (status = 404, description = "No company for this user")
    )
)]
#[tracing::instrument(skip(state, update))]
pub async fn update_company_profile(
    State(state): State<AppState>,
    ApiJson(update): ApiJson<CompanyProfileUpdate>,
) -> ApiResult<company::Model> {
    Ok(ApiResponse::ok(companies::update_profile(state.korea()?, update).await?))
}

#[utoipa::path(
    get,
    path = "/companies/{user_id}",
    params(("user_id" = Uuid, Path, description = "Owner's auth user id")),
    responses(
        (status = 200, description = "Company profile", body = ApiResponse<company::Model>),
        (status = 404, description = "No company for this user")
    )
)]
#[tracing::instrument(skip(state))]
pub async fn get_company(State(state): State<AppState>, ApiPath(user_id): ApiPath<Uuid>) -> ApiResult<company::Model> {
    Ok(ApiResponse::ok(companies::find_by_user(state.korea()?, user_id).await?))
}
