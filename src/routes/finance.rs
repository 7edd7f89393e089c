use axum::extract::State;
use uuid::Uuid;

use super::{ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult, Deleted};
use crate::entities::{expense_records, receivables, revenue_records};
use crate::finance::{
    self, FinanceSummary, ImportOutcome, MonthProfitLoss, MonthQuery, NewExpense, NewRevenue, ReceivableQuery,
    TaxInvoiceIssue,
};
use crate::AppState;

#[utoipa::path(
    get,
    path = "/admin/finance/revenue",
    params(MonthQuery),
    responses((status = 200, description = "Revenue records", body = ApiResponse<Vec<revenue_records::Model>>))
)]
pub async fn list_revenue(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<MonthQuery>,
) -> ApiResult<Vec<revenue_records::Model>> {
    Ok(ApiResponse::ok(finance::list_revenue(state.biz()?, query.month.as_deref()).await?))
}

#[utoipa::path(
    post,
    path = "/admin/finance/revenue",
    request_body = NewRevenue,
    responses(
        (status = 200, description = "Created", body = ApiResponse<revenue_records::Model>),
        (status = 400, description = "Missing month or amount")
    )
)]
pub async fn create_revenue(
    State(state): State<AppState>,
    ApiJson(new): ApiJson<NewRevenue>,
) -> ApiResult<revenue_records::Model> {
    Ok(ApiResponse::ok(finance::create_revenue(state.biz()?, new).await?))
}

#[utoipa::path(
    put,
    path = "/admin/finance/revenue/{id}",
    params(("id" = Uuid, Path, description = "Revenue record id")),
    request_body = NewRevenue,
    responses(
        (status = 200, description = "Updated", body = ApiResponse<revenue_records::Model>),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_revenue(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(new): ApiJson<NewRevenue>,
) -> ApiResult<revenue_records::Model> {
    Ok(ApiResponse::ok(finance::update_revenue(state.biz()?, id, new).await?))
}

#[utoipa::path(
    delete,
    path = "/admin/finance/revenue/{id}",
    params(("id" = Uuid, Path, description = "Revenue record id")),
    responses(
        (status = 200, description = "Deleted", body = ApiResponse<Deleted>),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_revenue(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Deleted> {
    finance::delete_revenue(state.biz()?, id).await?;
    Ok(ApiResponse::ok(Deleted { deleted: true }))
}

/// Bulk upload of historical revenue. The body is the raw CSV file.
#[utoipa::path(
    post,
    path = "/admin/finance/revenue/import",
    request_body(content = String, content_type = "text/csv", description = "date,type,amount,description,category"),
    responses(
        (status = 200, description = "Rows inserted", body = ApiResponse<ImportOutcome>),
        (status = 400, description = "Unreadable dates, with their line numbers"),
        (status = 422, description = "No valid rows")
    )
)]
#[tracing::instrument(skip(state, body))]
pub async fn import_revenue(State(state): State<AppState>, body: String) -> ApiResult<ImportOutcome> {
    Ok(ApiResponse::ok(finance::import_revenue_csv(state.biz()?, &body).await?))
}

#[utoipa::path(
    post,
    path = "/admin/finance/revenue/{id}/tax-invoice",
    params(("id" = Uuid, Path, description = "Revenue record id")),
    request_body = TaxInvoiceIssue,
    responses(
        (status = 200, description = "Invoice recorded", body = ApiResponse<revenue_records::Model>),
        (status = 409, description = "Invoice already issued")
    )
)]
pub async fn issue_tax_invoice(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(issue): ApiJson<TaxInvoiceIssue>,
) -> ApiResult<revenue_records::Model> {
    Ok(ApiResponse::ok(finance::issue_tax_invoice(state.biz()?, id, issue).await?))
}

#[utoipa::path(
    get,
    path = "/admin/finance/expenses",
    params(MonthQuery),
    responses((status = 200, description = "Expense records", body = ApiResponse<Vec<expense_records::Model>>))
)]
pub async fn list_expenses(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<MonthQuery>,
) -> ApiResult<Vec<expense_records::Model>> {
    Ok(ApiResponse::ok(finance::list_expenses(state.biz()?, query.month.as_deref()).await?))
}

#[utoipa::path(
    post,
    path = "/admin/finance/expenses",
    request_body = NewExpense,
    responses(
        (status = 200, description = "Created", body = ApiResponse<expense_records::Model>),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn create_expense(
    State(state): State<AppState>,
    ApiJson(new): ApiJson<NewExpense>,
) -> ApiResult<expense_records::Model> {
    Ok(ApiResponse::ok(finance::create_expense(state.biz()?, new).await?))
}

#[utoipa::path(
    put,
    path = "/admin/finance/expenses/{id}",
    params(("id" = Uuid, Path, description = "Expense record id")),
    request_body = NewExpense,
    responses(
        (status = 200, description = "Updated", body = ApiResponse<expense_records::Model>),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_expense(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(new): ApiJson<NewExpense>,
) -> ApiResult<expense_records::Model> {
    Ok(ApiResponse::ok(finance::update_expense(state.biz()?, id, new).await?))
}

#[utoipa::path(
    delete,
    path = "/admin/finance/expenses/{id}",
    params(("id" = Uuid, Path, description = "Expense record id")),
    responses(
        (status = 200, description = "Deleted", body = ApiResponse<Deleted>),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_expense(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Deleted> {
    finance::delete_expense(state.biz()?, id).await?;
    Ok(ApiResponse::ok(Deleted { deleted: true }))
}

#[utoipa::path(
    get,
    path = "/admin/finance/summary",
    responses((status = 200, description = "Revenue, expenses and creator cost by month", body = ApiResponse<FinanceSummary>))
)]
#[tracing::instrument(skip(state))]
pub async fn summary(State(state): State<AppState>) -> ApiResult<FinanceSummary> {
    Ok(ApiResponse::ok(finance::finance_summary(state.biz()?).await?))
}

#[utoipa::path(
    get,
    path = "/admin/finance/month/{month}",
    params(("month" = String, Path, description = "YYYY-MM")),
    responses(
        (status = 200, description = "Profit and loss of one month", body = ApiResponse<MonthProfitLoss>),
        (status = 400, description = "Malformed month")
    )
)]
#[tracing::instrument(skip(state))]
pub async fn month_profit_loss(State(state): State<AppState>, ApiPath(month): ApiPath<String>) -> ApiResult<MonthProfitLoss> {
    Ok(ApiResponse::ok(finance::month_profit_loss(state.biz()?, &month).await?))
}

#[utoipa::path(
    get,
    path = "/admin/finance/receivables",
    params(ReceivableQuery),
    responses((status = 200, description = "Receivables by due date", body = ApiResponse<Vec<receivables::Model>>))
)]
pub async fn list_receivables(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ReceivableQuery>,
) -> ApiResult<Vec<receivables::Model>> {
    Ok(ApiResponse::ok(finance::list_receivables(state.biz()?, query.outstanding).await?))
}

#[utoipa::path(
    post,
    path = "/admin/finance/receivables/{id}/paid",
    params(("id" = Uuid, Path, description = "Receivable id")),
    responses(
        (status = 200, description = "Marked as paid", body = ApiResponse<receivables::Model>),
        (status = 409, description = "Already paid")
    )
)]
pub async fn mark_receivable_paid(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<receivables::Model> {
    Ok(ApiResponse::ok(finance::mark_receivable_paid(state.biz()?, id).await?))
}
