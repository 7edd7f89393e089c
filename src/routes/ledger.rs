use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::{ApiJson, ApiQuery, ApiResponse, ApiResult};
use crate::error::AppError;
use crate::export;
use crate::ledger::{
    audit::{self, AuditFilter, AuditReport},
    bonus::{self, BonusOutcome, BonusRequest},
    history::{self, HistoryFilter, LedgerEntry, PointStats},
    unpaid::{self, ManualPayOutcome, ManualPayRequest, UnpaidReport},
};
use crate::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct PointHistory {
    /// Entries matching the filter, newest first
    pub entries: Vec<LedgerEntry>,
    /// Totals over the whole history
    pub stats: PointStats,
    pub total: usize,
}

/// Merged point ledger of the Korea and Biz databases
#[utoipa::path(
    get,
    path = "/admin/points/history",
    params(HistoryFilter),
    responses(
        (status = 200, description = "Point history", body = ApiResponse<PointHistory>),
        (status = 500, description = "Database failure")
    )
)]
#[tracing::instrument(skip(state))]
pub async fn point_history(State(state): State<AppState>, ApiQuery(filter): ApiQuery<HistoryFilter>) -> ApiResult<PointHistory> {
    let all = history::load_history(&state.dbs).await?;
    Ok(ApiResponse::ok(PointHistory {
        stats: PointStats::from_entries(&all),
        total: all.len(),
        entries: filter.apply(&all),
    }))
}

#[utoipa::path(
    get,
    path = "/admin/points/history.csv",
    params(HistoryFilter),
    responses((status = 200, description = "CSV download", content_type = "text/csv", body = String))
)]
#[tracing::instrument(skip(state))]
pub async fn point_history_csv(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<HistoryFilter>,
) -> Result<impl IntoResponse, AppError> {
    let all = history::load_history(&state.dbs).await?;
    let body = export::history_csv(&filter.apply(&all))?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, export::attachment("포인트내역", Utc::now())),
        ],
        body,
    ))
}

/// Reconciles withdrawal requests against ledger balances
#[utoipa::path(
    get,
    path = "/admin/withdrawals/audit",
    params(AuditFilter),
    responses(
        (status = 200, description = "One report per source database", body = ApiResponse<Vec<AuditReport>>),
        (status = 500, description = "Database failure or source not configured")
    )
)]
#[tracing::instrument(skip(state))]
pub async fn withdrawal_audit(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<AuditFilter>,
) -> ApiResult<Vec<AuditReport>> {
    let reports = audit::audit_all(&state.dbs, filter.source).await?;
    Ok(ApiResponse::ok(reports.iter().map(|r| r.filtered(&filter)).collect()))
}

#[utoipa::path(
    get,
    path = "/admin/withdrawals/audit.csv",
    params(AuditFilter),
    responses(
        (status = 200, description = "CSV download", content_type = "text/csv", body = String),
        (status = 422, description = "Nothing to export")
    )
)]
#[tracing::instrument(skip(state))]
pub async fn withdrawal_audit_csv(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<AuditFilter>,
) -> Result<impl IntoResponse, AppError> {
    let reports = audit::audit_all(&state.dbs, filter.source).await?;
    let rows: Vec<_> = reports
        .iter()
        .flat_map(|r| r.filtered(&filter).rows)
        .collect();
    let body = export::audit_csv(&rows)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, export::attachment("출금감사", Utc::now())),
        ],
        body,
    ))
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum UnpaidAction {
    Report(UnpaidReport),
    Paid(ManualPayOutcome),
}

#[derive(Debug, Deserialize)]
struct ActionEnvelope {
    action: Option<String>,
}

/// `action = get_unpaid` scans every creator region; `action = manual_pay`
/// credits one creator by hand.
#[utoipa::path(
    post,
    path = "/functions/check-unpaid-points",
    request_body(content = Object, description = "{ action: get_unpaid } or { action: manual_pay, region, userId, amount, campaignId?, videoId?, reason? }"),
    responses(
        (status = 200, description = "Scan report or payment result", body = ApiResponse<UnpaidAction>),
        (status = 400, description = "Unknown action or missing fields")
    )
)]
#[tracing::instrument(skip(state, body))]
pub async fn check_unpaid_points(State(state): State<AppState>, ApiJson(body): ApiJson<Value>) -> ApiResult<UnpaidAction> {
    let envelope: ActionEnvelope = serde_json::from_value(body.clone())
        .map_err(|_| AppError::InvalidRequest("Invalid action".to_string()))?;

    match envelope.action.as_deref() {
        Some("get_unpaid") => {
            let report = unpaid::find_unpaid(&state.dbs, Utc::now()).await;
            Ok(ApiResponse::ok(UnpaidAction::Report(report)))
        }
        Some("manual_pay") => {
            let req: ManualPayRequest = serde_json::from_value(body)
                .map_err(|e| AppError::InvalidRequest(format!("잘못된 요청입니다: {}", e)))?;
            let outcome = unpaid::manual_pay(&state.dbs, req).await?;
            Ok(ApiResponse::ok(UnpaidAction::Paid(outcome)))
        }
        _ => Err(AppError::InvalidRequest("Invalid action".to_string())),
    }
}

/// Pays the affiliated-creator bonus on top of a campaign reward
#[utoipa::path(
    post,
    path = "/functions/award-bonus-points",
    request_body = BonusRequest,
    responses(
        (status = 200, description = "Bonus paid or skipped", body = ApiResponse<BonusOutcome>),
        (status = 400, description = "Missing parameters")
    )
)]
#[tracing::instrument(skip(state))]
pub async fn award_bonus_points(State(state): State<AppState>, ApiJson(req): ApiJson<BonusRequest>) -> ApiResult<BonusOutcome> {
    let outcome = bonus::award_bonus(&state.dbs, req, state.config.affiliated_bonus_rate).await?;
    Ok(ApiResponse::ok(outcome))
}
