//! Creator payout requests: quoting, validation, the admin state machine
//! and the weekly report.

pub mod report;
pub mod resident;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::entities::{creator_withdrawal_requests, featured_creators};
use crate::error::AppError;
use crate::ledger::audit::WithdrawalStatus;
use crate::region::Region;

pub const KOREA_TAX_RATE: f64 = 0.033;

/// Point-to-currency conversion for a payout region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExchangeRate {
    pub rate: f64,
    pub currency: &'static str,
}

pub fn exchange_rate(region: Region) -> Option<ExchangeRate> {
    match region {
        Region::Korea => Some(ExchangeRate { rate: 1.0, currency: "KRW" }),
        Region::Japan => Some(ExchangeRate { rate: 9.0, currency: "JPY" }),
        Region::Us => Some(ExchangeRate { rate: 0.00075, currency: "USD" }),
        Region::Taiwan | Region::Biz => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PayoutQuote {
    pub requested_amount: f64,
    pub currency: String,
    pub tax_amount: f64,
    pub final_amount: f64,
}

/// Converts points to the payout currency; Korea withholds 3.3%.
pub fn quote(points: i64, region: Region) -> Option<PayoutQuote> {
    let ExchangeRate { rate, currency } = exchange_rate(region)?;
    let requested_amount = points as f64 * rate;
    let tax_amount = if region == Region::Korea {
        requested_amount * KOREA_TAX_RATE
    } else {
        0.0
    };
    Some(PayoutQuote {
        requested_amount,
        currency: currency.to_string(),
        tax_amount,
        final_amount: requested_amount - tax_amount,
    })
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct NewWithdrawal {
    pub creator_id: Option<Uuid>,
    /// Defaults to the creator's region
    pub region: Option<String>,
    pub requested_points: Option<i64>,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub account_holder: Option<String>,
    pub resident_registration_number: Option<String>,
    pub paypal_email: Option<String>,
}

fn required<'a>(value: &'a Option<String>, message: &str) -> Result<&'a str, AppError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::InvalidRequest(message.to_string()))
}

impl NewWithdrawal {
    /// Field checks that need no database access.
    pub fn validate(&self, region: Region) -> Result<i64, AppError> {
        let points = self
            .requested_points
            .filter(|p| *p > 0)
            .ok_or_else(|| AppError::InvalidRequest("출금할 포인트를 입력해주세요.".to_string()))?;

        match region {
            Region::Korea => {
                required(&self.bank_name, "은행명을 입력해주세요.")?;
                required(&self.account_number, "계좌번호를 입력해주세요.")?;
                required(&self.account_holder, "예금주를 입력해주세요.")?;
                let rrn = required(&self.resident_registration_number, "주민등록번호를 입력해주세요.")?;
                if !resident::is_valid(rrn) {
                    return Err(AppError::InvalidRequest("유효하지 않은 주민등록번호입니다.".to_string()));
                }
            }
            Region::Japan | Region::Us => {
                let email = required(&self.paypal_email, "PayPal 이메일을 입력해주세요.")?;
                if !email.contains('@') {
                    return Err(AppError::InvalidRequest("PayPal 이메일 형식이 올바르지 않습니다.".to_string()));
                }
            }
            Region::Taiwan | Region::Biz => {
                return Err(AppError::InvalidRequest(format!(
                    "{} 리전은 출금 신청을 지원하지 않습니다.",
                    region
                )))
            }
        }
        Ok(points)
    }
}

/// Points already held by pending, approved or processing requests.
pub async fn open_request_total(db: &DatabaseConnection, creator_id: Uuid) -> Result<i64, AppError> {
    let open: Vec<&str> = [WithdrawalStatus::Pending, WithdrawalStatus::Approved, WithdrawalStatus::Processing]
        .iter()
        .map(|s| s.as_str())
        .collect();

    Ok(creator_withdrawal_requests::Entity::find()
        .filter(creator_withdrawal_requests::Column::CreatorId.eq(creator_id))
        .filter(creator_withdrawal_requests::Column::Status.is_in(open))
        .all(db)
        .await?
        .iter()
        .map(|w| w.requested_points)
        .sum())
}

/// Files a payout request in the Biz database.
#[tracing::instrument(skip(db, encryption_key, req), fields(creator_id = ?req.creator_id))]
pub async fn create_request(
    db: &DatabaseConnection,
    encryption_key: Option<&str>,
    req: NewWithdrawal,
) -> Result<creator_withdrawal_requests::Model, AppError> {
    let creator_id = req
        .creator_id
        .ok_or_else(|| AppError::InvalidRequest("크리에이터 ID가 필요합니다.".to_string()))?;

    let creator = featured_creators::Entity::find_by_id(creator_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("creator {}", creator_id)))?;

    let region = Region::parse(
        req.region
            .as_deref()
            .or(creator.region.as_deref())
            .unwrap_or_default(),
    );
    let points = req.validate(region)?;

    let available = creator.points_balance.unwrap_or(0) - open_request_total(db, creator_id).await?;
    if points > available {
        return Err(AppError::UnprocessableEntity(
            "보유 포인트보다 많이 출금할 수 없습니다.".to_string(),
        ));
    }

    let payout = quote(points, region)
        .ok_or_else(|| AppError::InvalidRequest(format!("{} 리전은 출금 신청을 지원하지 않습니다.", region)))?;

    let encrypted_rrn = match (region, req.resident_registration_number.as_deref()) {
        (Region::Korea, Some(rrn)) => {
            let key = encryption_key
                .ok_or_else(|| AppError::InternalError("ENCRYPTION_KEY is not configured".to_string()))?;
            Some(resident::encrypt(db, rrn.trim(), key).await?)
        }
        _ => None,
    };

    let korea = region == Region::Korea;
    let model = creator_withdrawal_requests::Model {
        id: Uuid::new_v4(),
        creator_id,
        creator_name: creator.display_name(),
        region: Some(region.as_str().to_string()),
        requested_points: points,
        requested_amount: Some(payout.requested_amount),
        currency: Some(payout.currency),
        tax_amount: Some(payout.tax_amount),
        final_amount: Some(payout.final_amount),
        status: WithdrawalStatus::Pending.as_str().to_string(),
        bank_name: req.bank_name.filter(|_| korea),
        account_number: req.account_number.filter(|_| korea),
        account_holder: req.account_holder.filter(|_| korea),
        resident_registration_number: encrypted_rrn,
        paypal_email: req.paypal_email.filter(|_| !korea),
        priority: None,
        admin_notes: None,
        rejection_reason: None,
        processed_at: None,
        completed_at: None,
        created_at: Utc::now(),
    };

    let active = creator_withdrawal_requests::ActiveModel::from(model.clone()).reset_all();
    creator_withdrawal_requests::Entity::insert(active)
        .exec_without_returning(db)
        .await?;

    tracing::info!("Withdrawal request {} filed: {} points ({})", model.id, points, region);
    Ok(model)
}

/// Admin actions on a payout request.
#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Transition {
    Approve {
        priority: Option<i32>,
        admin_notes: Option<String>,
    },
    Reject {
        reason: Option<String>,
    },
    Complete,
}

impl Transition {
    fn target(&self) -> WithdrawalStatus {
        match self {
            Transition::Approve { .. } => WithdrawalStatus::Approved,
            Transition::Reject { .. } => WithdrawalStatus::Rejected,
            Transition::Complete => WithdrawalStatus::Completed,
        }
    }

    /// The next status, or a conflict when the move is not allowed from `current`.
    pub fn next_status(&self, current: &str) -> Result<WithdrawalStatus, AppError> {
        use WithdrawalStatus::*;

        let from = WithdrawalStatus::parse(current);
        let allowed = match self {
            Transition::Approve { .. } => matches!(from, Some(Pending)),
            Transition::Reject { .. } => matches!(from, Some(Pending | Approved)),
            Transition::Complete => matches!(from, Some(Approved | Processing)),
        };
        if !allowed {
            return Err(AppError::Conflict(format!(
                "{} 상태의 출금 신청은 {}(으)로 변경할 수 없습니다.",
                current,
                self.target().as_str()
            )));
        }
        Ok(self.target())
    }
}

#[tracing::instrument(skip(db))]
pub async fn transition(
    db: &DatabaseConnection,
    id: Uuid,
    action: Transition,
) -> Result<creator_withdrawal_requests::Model, AppError> {
    if let Transition::Reject { reason } = &action {
        if reason.as_deref().map(str::trim).unwrap_or_default().is_empty() {
            return Err(AppError::InvalidRequest("거절 사유를 입력해주세요.".to_string()));
        }
    }

    let current = creator_withdrawal_requests::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("withdrawal request {}", id)))?;
    let next = action.next_status(&current.status)?;

    let now = Utc::now();
    let mut active: creator_withdrawal_requests::ActiveModel = current.into();
    active.status = Set(next.as_str().to_string());
    match action {
        Transition::Approve { priority, admin_notes } => {
            active.priority = Set(priority);
            active.admin_notes = Set(admin_notes);
            active.processed_at = Set(Some(now));
        }
        Transition::Reject { reason } => {
            active.rejection_reason = Set(reason);
            active.processed_at = Set(Some(now));
        }
        Transition::Complete => {
            active.completed_at = Set(Some(now));
        }
    }

    let updated = active.update(db).await?;
    tracing::info!("Withdrawal request {} -> {}", id, next.as_str());
    Ok(updated)
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WithdrawalQuery {
    /// pending | approved | processing | completed | rejected
    #[param(required = false)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct WithdrawalStats {
    pub pending: usize,
    pub approved: usize,
    pub completed: usize,
    pub completed_amount: f64,
}

impl WithdrawalStats {
    pub fn from_requests(requests: &[creator_withdrawal_requests::Model]) -> Self {
        let mut stats = WithdrawalStats::default();
        for r in requests {
            match WithdrawalStatus::parse(&r.status) {
                Some(WithdrawalStatus::Pending) => stats.pending += 1,
                Some(WithdrawalStatus::Approved | WithdrawalStatus::Processing) => stats.approved += 1,
                Some(WithdrawalStatus::Completed) => {
                    stats.completed += 1;
                    stats.completed_amount += r.requested_amount.unwrap_or(0.0);
                }
                _ => {}
            }
        }
        stats
    }
}

/// A payout request as shown to admins. The stored resident number never
/// leaves the service; only its masked form does.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WithdrawalView {
    #[serde(flatten)]
    pub request: creator_withdrawal_requests::Model,
    pub resident_number_masked: Option<String>,
}

impl WithdrawalView {
    async fn load(db: &DatabaseConnection, encryption_key: Option<&str>, request: creator_withdrawal_requests::Model) -> Self {
        let resident_number_masked = match (request.resident_registration_number.as_deref(), encryption_key) {
            (Some(encrypted), Some(key)) => resident::masked(db, encrypted, key).await,
            _ => None,
        };
        WithdrawalView {
            request,
            resident_number_masked,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WithdrawalListing {
    pub requests: Vec<WithdrawalView>,
    pub stats: WithdrawalStats,
}

pub async fn list_requests(
    db: &DatabaseConnection,
    encryption_key: Option<&str>,
    query: &WithdrawalQuery,
) -> Result<WithdrawalListing, AppError> {
    let all = creator_withdrawal_requests::Entity::find()
        .order_by_desc(creator_withdrawal_requests::Column::CreatedAt)
        .all(db)
        .await?;
    let stats = WithdrawalStats::from_requests(&all);

    let selected: Vec<_> = match query.status.as_deref().filter(|s| !s.is_empty() && *s != "all") {
        Some(status) => all.into_iter().filter(|r| r.status == status).collect(),
        None => all,
    };
    let mut requests = Vec::with_capacity(selected.len());
    for request in selected {
        requests.push(WithdrawalView::load(db, encryption_key, request).await);
    }
    Ok(WithdrawalListing { requests, stats })
}

pub async fn get_request(db: &DatabaseConnection, encryption_key: Option<&str>, id: Uuid) -> Result<WithdrawalView, AppError> {
    let request = creator_withdrawal_requests::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("withdrawal request {}", id)))?;
    Ok(WithdrawalView::load(db, encryption_key, request).await)
}
