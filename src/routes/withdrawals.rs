use axum::extract::State;
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult};
use crate::entities::creator_withdrawal_requests;
use crate::withdrawals::{
    self,
    report::{self, ReportWindow, WeeklyReport},
    NewWithdrawal, Transition, WithdrawalListing, WithdrawalQuery, WithdrawalView,
};
use crate::AppState;

#[utoipa::path(
    get,
    path = "/withdrawals",
    params(WithdrawalQuery),
    responses((status = 200, description = "Payout requests with status counts", body = ApiResponse<WithdrawalListing>))
)]
#[tracing::instrument(skip(state))]
pub async fn list_withdrawals(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<WithdrawalQuery>,
) -> ApiResult<WithdrawalListing> {
    let listing =
        withdrawals::list_requests(state.biz()?, state.config.encryption_key.as_deref(), &query).await?;
    Ok(ApiResponse::ok(listing))
}

#[utoipa::path(
    get,
    path = "/withdrawals/{id}",
    params(("id" = Uuid, Path, description = "Withdrawal request id")),
    responses(
        (status = 200, description = "Payout request with masked resident number", body = ApiResponse<WithdrawalView>),
        (status = 404, description = "Not found")
    )
)]
#[tracing::instrument(skip(state))]
pub async fn get_withdrawal(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<WithdrawalView> {
    let view = withdrawals::get_request(state.biz()?, state.config.encryption_key.as_deref(), id).await?;
    Ok(ApiResponse::ok(view))
}

/// Creator payout request
#[utoipa::path(
    post,
    path = "/withdrawals",
    request_body = NewWithdrawal,
    responses(
        (status = 200, description = "Request filed", body = ApiResponse<creator_withdrawal_requests::Model>),
        (status = 400, description = "Invalid amount or payout details"),
        (status = 422, description = "Requested more than the available balance")
    )
)]
#[tracing::instrument(skip(state, req))]
pub async fn request_withdrawal(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<NewWithdrawal>,
) -> ApiResult<creator_withdrawal_requests::Model> {
    let created = withdrawals::create_request(state.biz()?, state.config.encryption_key.as_deref(), req).await?;
    Ok(ApiResponse::ok(created))
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ApproveBody {
    pub priority: Option<i32>,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RejectBody {
    pub reason: Option<String>,
}

#[utoipa::path(
    post,
    path = "/withdrawals/{id}/approve",
    params(("id" = Uuid, Path, description = "Withdrawal request id")),
    request_body = ApproveBody,
    responses(
        (status = 200, description = "Approved", body = ApiResponse<creator_withdrawal_requests::Model>),
        (status = 409, description = "Request is not pending")
    )
)]
#[tracing::instrument(skip(state))]
pub async fn approve_withdrawal(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<ApproveBody>,
) -> ApiResult<creator_withdrawal_requests::Model> {
    let action = Transition::Approve {
        priority: body.priority,
        admin_notes: body.admin_notes,
    };
    Ok(ApiResponse::ok(withdrawals::transition(state.biz()?, id, action).await?))
}

#[utoipa::path(
    post,
    path = "/withdrawals/{id}/reject",
    params(("id" = Uuid, Path, description = "Withdrawal request id")),
    request_body = RejectBody,
    responses(
        (status = 200, description = "Rejected", body = ApiResponse<creator_withdrawal_requests::Model>),
        (status = 400, description = "Missing rejection reason"),
        (status = 409, description = "Request already finished")
    )
)]
#[tracing::instrument(skip(state))]
pub async fn reject_withdrawal(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<RejectBody>,
) -> ApiResult<creator_withdrawal_requests::Model> {
    let action = Transition::Reject { reason: body.reason };
    Ok(ApiResponse::ok(withdrawals::transition(state.biz()?, id, action).await?))
}

#[utoipa::path(
    post,
    path = "/withdrawals/{id}/complete",
    params(("id" = Uuid, Path, description = "Withdrawal request id")),
    responses(
        (status = 200, description = "Marked as paid out", body = ApiResponse<creator_withdrawal_requests::Model>),
        (status = 409, description = "Request is not approved")
    )
)]
#[tracing::instrument(skip(state))]
pub async fn complete_withdrawal(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<creator_withdrawal_requests::Model> {
    Ok(ApiResponse::ok(
        withdrawals::transition(state.biz()?, id, Transition::Complete).await?,
    ))
}

/// Preview of the report the worker posts every Monday
#[utoipa::path(
    get,
    path = "/admin/withdrawals/weekly-report",
    responses((status = 200, description = "Previous KST week's open payout requests", body = ApiResponse<WeeklyReport>))
)]
#[tracing::instrument(skip(state))]
pub async fn weekly_report(State(state): State<AppState>) -> ApiResult<WeeklyReport> {
    let window = ReportWindow::previous_week(Utc::now());
    Ok(ApiResponse::ok(report::build_weekly_report(&state.dbs, window).await?))
}
