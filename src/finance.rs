//! Revenue and expense ledger of the Biz database, CSV import of historical
//! revenue, monthly profit summaries, tax invoices and receivables.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Months, NaiveDate, TimeZone, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::entities::{creator_withdrawal_requests, expense_records, receivables, revenue_records};
use crate::error::AppError;

pub const IMPORT_BATCH_SIZE: usize = 100;

const DATE_ALIASES: &[&str] = &["date", "날짜", "일자"];
const TYPE_ALIASES: &[&str] = &["type", "유형"];
const AMOUNT_ALIASES: &[&str] = &["amount", "금액"];
const DESCRIPTION_ALIASES: &[&str] = &["description", "설명"];
const CATEGORY_ALIASES: &[&str] = &["category", "카테고리"];
const CSV_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

/// Parses `YYYY-MM` into the first day of that month.
pub fn month_start(month: &str) -> Option<NaiveDate> {
    if month.len() != 7 {
        return None;
    }
    NaiveDate::parse_from_str(&format!("{}-01", month), "%Y-%m-%d").ok()
}

fn month_of(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// `[start, end)` of a calendar month in UTC.
fn month_bounds(month: &str) -> Result<(DateTime<Utc>, DateTime<Utc>), AppError> {
    let invalid = || AppError::InvalidRequest(format!("잘못된 월 형식입니다: {}", month));
    let start = month_start(month).ok_or_else(invalid)?;
    let end = start.checked_add_months(Months::new(1)).ok_or_else(invalid)?;
    let to_utc = |d: NaiveDate| d.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt));
    Ok((to_utc(start).ok_or_else(invalid)?, to_utc(end).ok_or_else(invalid)?))
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct MonthQuery {
    /// `YYYY-MM`
    pub month: Option<String>,
}

// ---------------------------------------------------------------------------
// Revenue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewRevenue {
    pub record_date: Option<NaiveDate>,
    /// Derived from `record_date` when omitted
    pub month: Option<String>,
    #[serde(rename = "type", default = "default_revenue_type")]
    pub record_type: String,
    pub amount: f64,
    pub description: Option<String>,
    pub category: Option<String>,
}

fn default_revenue_type() -> String {
    "revenue".to_string()
}

impl NewRevenue {
    fn resolved_month(&self) -> Result<String, AppError> {
        let month = match (&self.month, self.record_date) {
            (Some(m), _) if !m.trim().is_empty() => m.trim().to_string(),
            (_, Some(date)) => month_of(date),
            _ => return Err(AppError::InvalidRequest("월과 금액을 입력해주세요.".to_string())),
        };
        if month_start(&month).is_none() {
            return Err(AppError::InvalidRequest(format!("잘못된 월 형식입니다: {}", month)));
        }
        if self.amount == 0.0 || !self.amount.is_finite() {
            return Err(AppError::InvalidRequest("월과 금액을 입력해주세요.".to_string()));
        }
        Ok(month)
    }
}

pub async fn list_revenue(db: &DatabaseConnection, month: Option<&str>) -> Result<Vec<revenue_records::Model>, AppError> {
    let mut query = revenue_records::Entity::find();
    if let Some(month) = month {
        query = query.filter(revenue_records::Column::Month.eq(month));
    }
    Ok(query
        .order_by_asc(revenue_records::Column::Month)
        .order_by_asc(revenue_records::Column::RecordDate)
        .all(db)
        .await?)
}

#[tracing::instrument(skip(db))]
pub async fn create_revenue(db: &DatabaseConnection, new: NewRevenue) -> Result<revenue_records::Model, AppError> {
    let month = new.resolved_month()?;
    let record = revenue_records::Model {
        id: Uuid::new_v4(),
        record_date: new.record_date,
        month,
        record_type: new.record_type,
        amount: new.amount,
        description: new.description,
        category: new.category,
        tax_invoice_issued: Some(false),
        tax_invoice_number: None,
        tax_invoice_date: None,
        created_at: Utc::now(),
    };
    revenue_records::Entity::insert(revenue_records::ActiveModel::from(record.clone()).reset_all())
        .exec_without_returning(db)
        .await?;
    Ok(record)
}

async fn find_revenue(db: &DatabaseConnection, id: Uuid) -> Result<revenue_records::Model, AppError> {
    revenue_records::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("revenue record {}", id)))
}

#[tracing::instrument(skip(db))]
pub async fn update_revenue(db: &DatabaseConnection, id: Uuid, new: NewRevenue) -> Result<revenue_records::Model, AppError> {
    let month = new.resolved_month()?;
    let mut active: revenue_records::ActiveModel = find_revenue(db, id).await?.into();
    active.record_date = Set(new.record_date);
    active.month = Set(month);
    active.record_type = Set(new.record_type);
    active.amount = Set(new.amount);
    active.description = Set(new.description);
    active.category = Set(new.category);
    Ok(active.update(db).await?)
}

pub async fn delete_revenue(db: &DatabaseConnection, id: Uuid) -> Result<(), AppError> {
    let result = revenue_records::Entity::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound(format!("revenue record {}", id)));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TaxInvoiceIssue {
    pub tax_invoice_number: String,
    /// Defaults to today
    pub tax_invoice_date: Option<NaiveDate>,
}

#[tracing::instrument(skip(db))]
pub async fn issue_tax_invoice(
    db: &DatabaseConnection,
    id: Uuid,
    issue: TaxInvoiceIssue,
) -> Result<revenue_records::Model, AppError> {
    if issue.tax_invoice_number.trim().is_empty() {
        return Err(AppError::InvalidRequest("세금계산서 번호가 필요합니다.".to_string()));
    }
    let record = find_revenue(db, id).await?;
    if record.tax_invoice_issued == Some(true) {
        return Err(AppError::Conflict("이미 세금계산서가 발행되었습니다.".to_string()));
    }

    let mut active: revenue_records::ActiveModel = record.into();
    active.tax_invoice_issued = Set(Some(true));
    active.tax_invoice_number = Set(Some(issue.tax_invoice_number.trim().to_string()));
    active.tax_invoice_date = Set(Some(issue.tax_invoice_date.unwrap_or_else(|| Utc::now().date_naive())));
    let saved = active.update(db).await?;
    tracing::info!("Tax invoice {:?} issued for revenue {}", saved.tax_invoice_number, saved.id);
    Ok(saved)
}

// ---------------------------------------------------------------------------
// CSV import
// ---------------------------------------------------------------------------

struct HeaderMap(Vec<String>);

impl HeaderMap {
    fn new(headers: &StringRecord) -> Self {
        HeaderMap(
            headers
                .iter()
                .map(|h| h.trim_start_matches('\u{feff}').trim().to_lowercase())
                .collect(),
        )
    }

    fn field<'r>(&self, row: &'r StringRecord, aliases: &[&str]) -> Option<&'r str> {
        aliases.iter().find_map(|alias| {
            let idx = self.0.iter().position(|h| h == alias)?;
            row.get(idx).map(str::trim).filter(|v| !v.is_empty())
        })
    }
}

fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite() && *v != 0.0)
}

fn parse_csv_date(value: &str) -> Option<NaiveDate> {
    CSV_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

/// Turns an uploaded CSV into revenue rows, skipping rows without a date,
/// a type or a non-zero amount. A date that is present but unreadable fails
/// the whole upload with the offending line numbers.
pub fn parse_revenue_csv(body: &str) -> Result<Vec<revenue_records::Model>, AppError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(body.as_bytes());
    let headers = HeaderMap::new(reader.headers()?);
    let now = Utc::now();

    let mut records = Vec::new();
    let mut bad_dates = Vec::new();
    for row in reader.records() {
        let row = row?;
        let Some(raw_date) = headers.field(&row, DATE_ALIASES) else {
            continue;
        };
        let Some(date) = parse_csv_date(raw_date) else {
            bad_dates.push(row.position().map_or(0, |p| p.line()));
            continue;
        };
        let Some(record_type) = headers.field(&row, TYPE_ALIASES) else {
            continue;
        };
        let Some(amount) = headers.field(&row, AMOUNT_ALIASES).and_then(parse_amount) else {
            continue;
        };

        records.push(revenue_records::Model {
            id: Uuid::new_v4(),
            record_date: Some(date),
            month: month_of(date),
            record_type: record_type.to_string(),
            amount,
            description: Some(headers.field(&row, DESCRIPTION_ALIASES).unwrap_or_default().to_string()),
            category: headers.field(&row, CATEGORY_ALIASES).map(str::to_string),
            tax_invoice_issued: Some(false),
            tax_invoice_number: None,
            tax_invoice_date: None,
            created_at: now,
        });
    }

    if !bad_dates.is_empty() {
        let lines: Vec<String> = bad_dates.iter().map(u64::to_string).collect();
        return Err(AppError::InvalidRequest(format!(
            "날짜 형식을 인식할 수 없습니다 ({}행). YYYY-MM-DD, YYYY/MM/DD, YYYY.MM.DD 형식을 사용하세요.",
            lines.join(", ")
        )));
    }
    Ok(records)
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ImportOutcome {
    pub inserted: usize,
    pub message: String,
}

#[tracing::instrument(skip(db, body), fields(bytes = body.len()))]
pub async fn import_revenue_csv(db: &DatabaseConnection, body: &str) -> Result<ImportOutcome, AppError> {
    let records = parse_revenue_csv(body)?;
    if records.is_empty() {
        return Err(AppError::UnprocessableEntity("유효한 데이터가 없습니다.".to_string()));
    }

    let txn = db.begin().await?;
    for batch in records.chunks(IMPORT_BATCH_SIZE) {
        revenue_records::Entity::insert_many(
            batch
                .iter()
                .cloned()
                .map(|r| revenue_records::ActiveModel::from(r).reset_all()),
        )
        .exec_without_returning(&txn)
        .await?;
    }
    txn.commit().await?;

    tracing::info!("Imported {} revenue rows", records.len());
    Ok(ImportOutcome {
        inserted: records.len(),
        message: format!("{}건의 데이터가 성공적으로 업로드되었습니다.", records.len()),
    })
}

// ---------------------------------------------------------------------------
// Expenses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewExpense {
    /// `fixed` or `variable`
    pub expense_type: String,
    pub category: Option<String>,
    pub description: String,
    pub amount: f64,
    pub expense_date: Option<NaiveDate>,
    /// Derived from `expense_date` when omitted
    pub expense_month: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
    pub recurring_day: Option<i32>,
}

impl NewExpense {
    /// Returns the month the expense is booked under.
    fn validate(&self) -> Result<String, AppError> {
        if self.description.trim().is_empty() || !(self.amount > 0.0) {
            return Err(AppError::InvalidRequest("필수 항목을 입력해주세요.".to_string()));
        }
        if !matches!(self.expense_type.as_str(), "fixed" | "variable") {
            return Err(AppError::InvalidRequest(format!("알 수 없는 비용 유형입니다: {}", self.expense_type)));
        }
        if self.is_recurring && !self.recurring_day.is_some_and(|d| (1..=31).contains(&d)) {
            return Err(AppError::InvalidRequest("반복일은 1~31 사이여야 합니다.".to_string()));
        }
        let month = match (&self.expense_month, self.expense_date) {
            (Some(m), _) if month_start(m).is_some() => m.clone(),
            (Some(m), _) => return Err(AppError::InvalidRequest(format!("잘못된 월 형식입니다: {}", m))),
            (None, Some(date)) => month_of(date),
            (None, None) => month_of(Utc::now().date_naive()),
        };
        Ok(month)
    }

    fn recurring_day(&self) -> Option<i32> {
        self.recurring_day.filter(|_| self.is_recurring)
    }
}

pub async fn list_expenses(db: &DatabaseConnection, month: Option<&str>) -> Result<Vec<expense_records::Model>, AppError> {
    let mut query = expense_records::Entity::find();
    if let Some(month) = month {
        query = query.filter(expense_records::Column::ExpenseMonth.eq(month));
    }
    Ok(query
        .order_by_desc(expense_records::Column::ExpenseDate)
        .all(db)
        .await?)
}

#[tracing::instrument(skip(db))]
pub async fn create_expense(db: &DatabaseConnection, new: NewExpense) -> Result<expense_records::Model, AppError> {
    let month = new.validate()?;
    let record = expense_records::Model {
        id: Uuid::new_v4(),
        recurring_day: new.recurring_day(),
        expense_type: new.expense_type,
        category: new.category,
        description: new.description.trim().to_string(),
        amount: new.amount,
        expense_date: new.expense_date,
        expense_month: month,
        is_recurring: new.is_recurring,
        created_at: Utc::now(),
    };
    expense_records::Entity::insert(expense_records::ActiveModel::from(record.clone()).reset_all())
        .exec_without_returning(db)
        .await?;
    Ok(record)
}

#[tracing::instrument(skip(db))]
pub async fn update_expense(db: &DatabaseConnection, id: Uuid, new: NewExpense) -> Result<expense_records::Model, AppError> {
    let month = new.validate()?;
    let existing = expense_records::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("expense record {}", id)))?;

    let mut active: expense_records::ActiveModel = existing.into();
    active.recurring_day = Set(new.recurring_day());
    active.expense_type = Set(new.expense_type);
    active.category = Set(new.category);
    active.description = Set(new.description.trim().to_string());
    active.amount = Set(new.amount);
    active.expense_date = Set(new.expense_date);
    active.expense_month = Set(month);
    active.is_recurring = Set(new.is_recurring);
    Ok(active.update(db).await?)
}

pub async fn delete_expense(db: &DatabaseConnection, id: Uuid) -> Result<(), AppError> {
    let result = expense_records::Entity::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound(format!("expense record {}", id)));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

fn withdrawal_cost(w: &creator_withdrawal_requests::Model) -> f64 {
    w.final_amount
        .or(w.requested_amount)
        .unwrap_or(w.requested_points as f64)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct MonthSummary {
    pub month: String,
    pub revenue: f64,
    pub expenses: f64,
    pub creator_cost: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct FinanceSummary {
    pub months: Vec<MonthSummary>,
    pub total_revenue: f64,
    pub total_expenses: f64,
    pub total_creator_cost: f64,
    pub net_profit: f64,
}

impl FinanceSummary {
    /// Groups by month; creator cost is booked in the month a completed
    /// withdrawal was requested.
    pub fn build(
        revenue: &[revenue_records::Model],
        expenses: &[expense_records::Model],
        completed_withdrawals: &[creator_withdrawal_requests::Model],
    ) -> Self {
        let mut by_month: BTreeMap<String, MonthSummary> = BTreeMap::new();
        let mut summary = FinanceSummary::default();
        for r in revenue {
            summary.total_revenue += r.amount;
            bump(&mut by_month, &r.month).revenue += r.amount;
        }
        for e in expenses {
            summary.total_expenses += e.amount;
            bump(&mut by_month, &e.expense_month).expenses += e.amount;
        }
        for w in completed_withdrawals {
            let cost = withdrawal_cost(w);
            summary.total_creator_cost += cost;
            bump(&mut by_month, &w.created_at.format("%Y-%m").to_string()).creator_cost += cost;
        }

        summary.months = by_month
            .into_values()
            .map(|mut m| {
                m.profit = m.revenue - m.expenses - m.creator_cost;
                m
            })
            .collect();
        summary.net_profit = summary.total_revenue - summary.total_expenses - summary.total_creator_cost;
        summary
    }
}

fn bump<'a>(by_month: &'a mut BTreeMap<String, MonthSummary>, month: &str) -> &'a mut MonthSummary {
    by_month.entry(month.to_string()).or_insert_with(|| MonthSummary {
        month: month.to_string(),
        ..Default::default()
    })
}

async fn completed_withdrawals(db: &DatabaseConnection) -> Result<Vec<creator_withdrawal_requests::Model>, AppError> {
    Ok(creator_withdrawal_requests::Entity::find()
        .filter(creator_withdrawal_requests::Column::Status.eq("completed"))
        .all(db)
        .await?)
}

#[tracing::instrument(skip(db))]
pub async fn finance_summary(db: &DatabaseConnection) -> Result<FinanceSummary, AppError> {
    let revenue = list_revenue(db, None).await?;
    let expenses = list_expenses(db, None).await?;
    let withdrawals = completed_withdrawals(db).await?;
    Ok(FinanceSummary::build(&revenue, &expenses, &withdrawals))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct MonthProfitLoss {
    pub month: String,
    pub revenue: f64,
    pub withdrawal_cost: f64,
    pub fixed_expenses: f64,
    pub variable_expenses: f64,
    pub net_profit: f64,
}

impl MonthProfitLoss {
    pub fn build(
        month: &str,
        revenue: &[revenue_records::Model],
        expenses: &[expense_records::Model],
        withdrawals: &[creator_withdrawal_requests::Model],
    ) -> Self {
        let sum_type = |kind: &str| -> f64 {
            expenses
                .iter()
                .filter(|e| e.expense_type == kind)
                .map(|e| e.amount)
                .sum()
        };
        let mut pnl = MonthProfitLoss {
            month: month.to_string(),
            revenue: revenue.iter().map(|r| r.amount).sum(),
            withdrawal_cost: withdrawals.iter().map(withdrawal_cost).sum(),
            fixed_expenses: sum_type("fixed"),
            variable_expenses: sum_type("variable"),
            net_profit: 0.0,
        };
        pnl.net_profit = pnl.revenue - pnl.withdrawal_cost - pnl.fixed_expenses - pnl.variable_expenses;
        pnl
    }
}

/// Withdrawal cost counts requests completed within the month.
#[tracing::instrument(skip(db))]
pub async fn month_profit_loss(db: &DatabaseConnection, month: &str) -> Result<MonthProfitLoss, AppError> {
    let (start, end) = month_bounds(month)?;
    let revenue = list_revenue(db, Some(month)).await?;
    let withdrawals = creator_withdrawal_requests::Entity::find()
        .filter(creator_withdrawal_requests::Column::Status.eq("completed"))
        .filter(creator_withdrawal_requests::Column::CompletedAt.gte(start))
        .filter(creator_withdrawal_requests::Column::CompletedAt.lt(end))
        .all(db)
        .await?;
    let expenses = list_expenses(db, Some(month)).await?;
    Ok(MonthProfitLoss::build(month, &revenue, &expenses, &withdrawals))
}

// ---------------------------------------------------------------------------
// Receivables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ReceivableQuery {
    /// Only rows not yet paid
    #[serde(default)]
    pub outstanding: bool,
}

pub async fn list_receivables(db: &DatabaseConnection, outstanding_only: bool) -> Result<Vec<receivables::Model>, AppError> {
    let mut query = receivables::Entity::find();
    if outstanding_only {
        query = query.filter(receivables::Column::Status.ne("paid"));
    }
    Ok(query.order_by_asc(receivables::Column::DueDate).all(db).await?)
}

#[tracing::instrument(skip(db))]
pub async fn mark_receivable_paid(db: &DatabaseConnection, id: Uuid) -> Result<receivables::Model, AppError> {
    let receivable = receivables::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("receivable {}", id)))?;
    if receivable.status == "paid" {
        return Err(AppError::Conflict("이미 입금 처리된 미수금입니다.".to_string()));
    }

    let mut active: receivables::ActiveModel = receivable.into();
    active.status = Set("paid".to_string());
    active.paid_at = Set(Some(Utc::now()));
    Ok(active.update(db).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn revenue(month: &str, amount: f64) -> revenue_records::Model {
        revenue_records::Model {
            id: Uuid::new_v4(),
            record_date: None,
            month: month.to_string(),
            record_type: "revenue".to_string(),
            amount,
            description: None,
            category: None,
            tax_invoice_issued: None,
            tax_invoice_number: None,
            tax_invoice_date: None,
            created_at: Utc::now(),
        }
    }

    fn expense(month: &str, kind: &str, amount: f64) -> expense_records::Model {
        expense_records::Model {
            id: Uuid::new_v4(),
            expense_type: kind.to_string(),
            category: None,
            description: "사무실 임대료".to_string(),
            amount,
            expense_date: None,
            expense_month: month.to_string(),
            is_recurring: false,
            recurring_day: None,
            created_at: Utc::now(),
        }
    }

    fn completed(created: &str, final_amount: f64) -> creator_withdrawal_requests::Model {
        creator_withdrawal_requests::Model {
            id: Uuid::new_v4(),
            creator_id: Uuid::new_v4(),
            creator_name: None,
            region: Some("korea".to_string()),
            requested_points: 100_000,
            requested_amount: Some(100_000.0),
            currency: Some("KRW".to_string()),
            tax_amount: None,
            final_amount: Some(final_amount),
            status: "completed".to_string(),
            bank_name: None,
            account_number: None,
            account_holder: None,
            resident_registration_number: None,
            paypal_email: None,
            priority: None,
            admin_notes: None,
            rejection_reason: None,
            processed_at: None,
            completed_at: None,
            created_at: created.parse().unwrap(),
        }
    }

    fn new_expense() -> NewExpense {
        NewExpense {
            expense_type: "fixed".to_string(),
            category: Some("office".to_string()),
            description: "사무실 임대료".to_string(),
            amount: 2_000_000.0,
            expense_date: NaiveDate::from_ymd_opt(2024, 3, 5),
            expense_month: None,
            is_recurring: true,
            recurring_day: Some(5),
        }
    }

    #[test]
    fn month_helpers() {
        assert_eq!(month_start("2024-02"), NaiveDate::from_ymd_opt(2024, 2, 1));
        assert_eq!(month_start("2024-13"), None);
        assert_eq!(month_start("2024-2"), None);
        let (start, end) = month_bounds("2024-12").unwrap();
        assert_eq!(start.to_rfc3339(), "2024-12-01T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn csv_import_handles_bom_aliases_and_bad_rows() {
        let body = "\u{feff}날짜, 유형 ,금액,설명,카테고리\n\
                    2024-01-15,revenue,\"10,000,000\",1월 캠페인 매출,campaign\n\
                    2024-01-20,fixed_cost,0,빈 금액,office\n\
                    ,revenue,5000,날짜 없음,\n\
                    2024-02-03,creator_cost,3000000,,\n";
        let rows = parse_revenue_csv(body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].amount, 10_000_000.0);
        assert_eq!(rows[0].month, "2024-01");
        assert_eq!(rows[0].category.as_deref(), Some("campaign"));
        assert_eq!(rows[1].month, "2024-02");
        assert_eq!(rows[1].description.as_deref(), Some(""));
        assert_eq!(rows[1].category, None);
    }

    #[test]
    fn csv_import_accepts_mixed_date_formats() {
        let body = "date,type,amount\n\
                    2024-01-15,revenue,1000\n\
                    2024/02/03,revenue,2000\n\
                    2024.03.09,fixed_cost,3000\n";
        let rows = parse_revenue_csv(body).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].record_date, NaiveDate::from_ymd_opt(2024, 2, 3));
        assert_eq!(rows[1].month, "2024-02");
        assert_eq!(rows[2].record_date, NaiveDate::from_ymd_opt(2024, 3, 9));
        assert_eq!(rows[2].month, "2024-03");
    }

    #[test]
    fn csv_import_rejects_unreadable_dates_with_line_numbers() {
        let body = "date,type,amount\n\
                    2024-01-15,revenue,1000\n\
                    15/01/2024,revenue,2000\n\
                    ,revenue,3000\n\
                    Jan 3,revenue,4000\n";
        let err = parse_revenue_csv(body).unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
        assert!(err.to_string().contains("(3, 5행)"), "{}", err);
    }

    #[test]
    fn csv_import_accepts_english_headers() {
        let body = "date,type,amount,description,category\n2024-01-15,revenue,10000,매출,campaign\n";
        let rows = parse_revenue_csv(body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].record_type, "revenue");
    }

    #[tokio::test]
    async fn empty_import_is_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let err = import_revenue_csv(&db, "date,type,amount\n2024-01-01,revenue,0\n")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "유효한 데이터가 없습니다.");
    }

    #[tokio::test]
    async fn import_inserts_in_batches() {
        let mut body = String::from("date,type,amount\n");
        for day in 0..150 {
            body.push_str(&format!("2024-01-{:02},revenue,{}\n", day % 28 + 1, day + 1));
        }
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult { last_insert_id: 0, rows_affected: 100 },
                MockExecResult { last_insert_id: 0, rows_affected: 50 },
            ])
            .into_connection();
        let outcome = import_revenue_csv(&db, &body).await.unwrap();
        assert_eq!(outcome.inserted, 150);
        assert_eq!(outcome.message, "150건의 데이터가 성공적으로 업로드되었습니다.");
    }

    #[test]
    fn expense_validation() {
        assert_eq!(new_expense().validate().unwrap(), "2024-03");

        let mut missing = new_expense();
        missing.description = " ".to_string();
        assert_eq!(missing.validate().unwrap_err().to_string(), "필수 항목을 입력해주세요.");

        let mut negative = new_expense();
        negative.amount = -1.0;
        assert!(negative.validate().is_err());

        let mut bad_day = new_expense();
        bad_day.recurring_day = Some(32);
        assert_eq!(bad_day.validate().unwrap_err().to_string(), "반복일은 1~31 사이여야 합니다.");

        let mut one_off = new_expense();
        one_off.is_recurring = false;
        one_off.recurring_day = Some(40);
        assert!(one_off.validate().is_ok());
        assert_eq!(one_off.recurring_day(), None);
    }

    #[test]
    fn summary_groups_by_month() {
        let summary = FinanceSummary::build(
            &[revenue("2024-01", 10_000_000.0), revenue("2024-02", 4_000_000.0)],
            &[expense("2024-01", "fixed", 2_000_000.0)],
            &[completed("2024-02-10T03:00:00Z", 967_000.0)],
        );
        assert_eq!(summary.months.len(), 2);
        assert_eq!(summary.months[0].month, "2024-01");
        assert_eq!(summary.months[0].profit, 8_000_000.0);
        assert_eq!(summary.months[1].creator_cost, 967_000.0);
        assert_eq!(summary.months[1].profit, 3_033_000.0);
        assert_eq!(summary.net_profit, 11_033_000.0);
    }

    #[test]
    fn month_pnl_splits_expense_types() {
        let pnl = MonthProfitLoss::build(
            "2024-01",
            &[revenue("2024-01", 5_000_000.0)],
            &[
                expense("2024-01", "fixed", 1_000_000.0),
                expense("2024-01", "variable", 250_000.0),
            ],
            &[completed("2024-01-03T00:00:00Z", 500_000.0)],
        );
        assert_eq!(pnl.fixed_expenses, 1_000_000.0);
        assert_eq!(pnl.variable_expenses, 250_000.0);
        assert_eq!(pnl.net_profit, 3_250_000.0);
    }

    #[tokio::test]
    async fn tax_invoice_cannot_be_issued_twice() {
        let mut issued = revenue("2024-01", 1_000.0);
        issued.tax_invoice_issued = Some(true);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![issued.clone()]])
            .into_connection();
        let err = issue_tax_invoice(
            &db,
            issued.id,
            TaxInvoiceIssue {
                tax_invoice_number: "20240101-0001".to_string(),
                tax_invoice_date: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn deleting_missing_expense_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult { last_insert_id: 0, rows_affected: 0 }])
            .into_connection();
        let err = delete_expense(&db, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::NOT_FOUND);
    }
}
