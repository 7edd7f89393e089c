use axum::extract::State;
use uuid::Uuid;

use super::{ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult};
use crate::campaigns::{
    self,
    applications::{self, ApplicationStatusChange, ApplicationUpdate},
    CampaignListing, CampaignQuery, CreateCampaignRequest, RegionInsertResult, RevenueOverview, StatusChange,
    StatusChanged,
};
use crate::region::Region;
use crate::AppState;

/// Inserts one campaign into each selected region
#[utoipa::path(
    post,
    path = "/functions/create-campaign",
    request_body = CreateCampaignRequest,
    responses(
        (status = 200, description = "Per-region insert results", body = ApiResponse<Vec<RegionInsertResult>>),
        (status = 400, description = "Missing title or regions")
    )
)]
#[tracing::instrument(skip(state, req))]
pub async fn create_campaign(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateCampaignRequest>,
) -> ApiResult<Vec<RegionInsertResult>> {
    let results = campaigns::create_in_regions(&state.dbs, req.campaign, &req.regions).await?;
    Ok(ApiResponse::ok(results))
}

#[utoipa::path(
    post,
    path = "/functions/update-campaign-status",
    request_body = StatusChange,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<StatusChanged>),
        (status = 400, description = "Missing or invalid fields"),
        (status = 404, description = "Campaign not found"),
        (status = 500, description = "Region not configured")
    )
)]
#[tracing::instrument(skip(state))]
pub async fn update_campaign_status(
    State(state): State<AppState>,
    ApiJson(change): ApiJson<StatusChange>,
) -> ApiResult<StatusChanged> {
    Ok(ApiResponse::ok(campaigns::update_status(&state.dbs, change).await?))
}

#[utoipa::path(
    get,
    path = "/campaigns",
    params(CampaignQuery),
    responses((status = 200, description = "Campaigns of one region", body = ApiResponse<CampaignListing>))
)]
#[tracing::instrument(skip(state))]
pub async fn list_campaigns(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CampaignQuery>,
) -> ApiResult<CampaignListing> {
    Ok(ApiResponse::ok(campaigns::list_campaigns(&state.dbs, &query).await?))
}

#[utoipa::path(
    post,
    path = "/applications/{region}/{id}/status",
    params(
        ("region" = String, Path, description = "korea, japan, us, taiwan or biz"),
        ("id" = Uuid, Path, description = "Application id")
    ),
    request_body = ApplicationStatusChange,
    responses(
        (status = 200, description = "Application moved", body = ApiResponse<ApplicationUpdate>),
        (status = 409, description = "Illegal status move or reward already paid"),
        (status = 422, description = "Reward could not be paid")
    )
)]
#[tracing::instrument(skip(state))]
pub async fn update_application_status(
    State(state): State<AppState>,
    ApiPath((region, id)): ApiPath<(String, Uuid)>,
    ApiJson(change): ApiJson<ApplicationStatusChange>,
) -> ApiResult<ApplicationUpdate> {
    let update =
        applications::update_application_status(&state.dbs, Region::parse(&region), id, &change.status).await?;
    Ok(ApiResponse::ok(update))
}

#[utoipa::path(
    get,
    path = "/admin/revenue/regions",
    responses((status = 200, description = "Confirmed campaign revenue per region and month", body = ApiResponse<RevenueOverview>))
)]
#[tracing::instrument(skip(state))]
pub async fn regional_revenue(State(state): State<AppState>) -> ApiResult<RevenueOverview> {
    Ok(ApiResponse::ok(campaigns::regional_revenue(&state.dbs).await?))
}
