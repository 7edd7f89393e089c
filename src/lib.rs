pub mod campaigns;
pub mod clients;
pub mod cms;
pub mod companies;
pub mod config;
pub mod entities;
pub mod error;
pub mod export;
pub mod finance;
pub mod jobs;
pub mod ledger;
pub mod region;
pub mod routes;
pub mod withdrawals;

use std::{num::NonZeroU32, sync::Arc, time::Duration};

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use chrono::FixedOffset;
use tower_governor::{governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::region::RegionalDatabases;

/// Korea Standard Time. Exports and the weekly report are written in KST.
pub(crate) fn kst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).unwrap_or_else(|| unreachable!("+09:00 is a valid offset"))
}

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub dbs: RegionalDatabases,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config, dbs: RegionalDatabases) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            config: Arc::new(config),
            dbs,
            http_client,
        }
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = String)
    )
)]
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "Service is healthy")
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "CNEC BIZ API",
        version = "0.1.0",
        description = "Back office for multi-region creator campaigns, point ledgers and payouts"
    ),
    paths(
        health_check,
        routes::ledger::point_history,
        routes::ledger::point_history_csv,
        routes::ledger::withdrawal_audit,
        routes::ledger::withdrawal_audit_csv,
        routes::ledger::check_unpaid_points,
        routes::ledger::award_bonus_points,
        routes::withdrawals::list_withdrawals,
        routes::withdrawals::request_withdrawal,
        routes::withdrawals::get_withdrawal,
        routes::withdrawals::approve_withdrawal,
        routes::withdrawals::reject_withdrawal,
        routes::withdrawals::complete_withdrawal,
        routes::withdrawals::weekly_report,
        routes::campaigns::create_campaign,
        routes::campaigns::update_campaign_status,
        routes::campaigns::list_campaigns,
        routes::campaigns::update_application_status,
        routes::campaigns::regional_revenue,
        routes::companies::update_company_profile,
        routes::companies::get_company,
        routes::finance::list_revenue,
        routes::finance::create_revenue,
        routes::finance::update_revenue,
        routes::finance::delete_revenue,
        routes::finance::import_revenue,
        routes::finance::issue_tax_invoice,
        routes::finance::list_expenses,
        routes::finance::create_expense,
        routes::finance::update_expense,
        routes::finance::delete_expense,
        routes::finance::summary,
        routes::finance::month_profit_loss,
        routes::finance::list_receivables,
        routes::finance::mark_receivable_paid,
        routes::cms::list_faqs,
        routes::cms::create_faq,
        routes::cms::update_faq,
        routes::cms::delete_faq,
        routes::cms::get_page,
        routes::cms::put_page,
        routes::cms::get_setting,
        routes::cms::put_setting,
        routes::cms::get_seo,
        routes::cms::put_seo,
        routes::cms::get_template,
        routes::cms::put_template,
        routes::cms::list_featured,
        routes::cms::create_featured,
        routes::cms::delete_featured,
        routes::integrations::fetch_youtube_data,
        routes::integrations::translate,
        routes::integrations::send_email,
    ),
    components(schemas(
        region::Region,
        routes::Deleted,
        ledger::SourceDb,
        ledger::history::LedgerEntry,
        ledger::history::PointStats,
        ledger::history::HistoryKind,
        ledger::audit::AuditRow,
        ledger::audit::AuditStats,
        ledger::audit::AuditReport,
        ledger::audit::WithdrawalStatus,
        ledger::audit::BalanceFormula,
        ledger::unpaid::UnpaidItem,
        ledger::unpaid::UnpaidKind,
        ledger::unpaid::UnpaidReport,
        ledger::unpaid::ManualPayRequest,
        ledger::unpaid::ManualPayOutcome,
        ledger::bonus::BonusRequest,
        ledger::bonus::BonusOutcome,
        withdrawals::NewWithdrawal,
        withdrawals::PayoutQuote,
        withdrawals::WithdrawalListing,
        withdrawals::WithdrawalView,
        withdrawals::report::WeeklyReport,
        campaigns::NewCampaign,
        campaigns::CreateCampaignRequest,
        campaigns::RegionInsertResult,
        campaigns::StatusChange,
        campaigns::StatusChanged,
        campaigns::CampaignListing,
        campaigns::RevenueOverview,
        campaigns::applications::ApplicationStatus,
        campaigns::applications::ApplicationStatusChange,
        campaigns::applications::ApplicationUpdate,
        companies::CompanyProfileUpdate,
        finance::NewRevenue,
        finance::NewExpense,
        finance::TaxInvoiceIssue,
        finance::ImportOutcome,
        finance::FinanceSummary,
        finance::MonthProfitLoss,
        cms::NewFaq,
        cms::SeoUpdate,
        cms::EmailTemplateUpdate,
        cms::NewFeaturedCreator,
        clients::EmailMessage,
        clients::youtube::ChannelInfo,
        clients::youtube::VideoInfo,
        entities::companies::Model,
        entities::campaigns::Model,
        entities::creator_withdrawal_requests::Model,
        entities::revenue_records::Model,
        entities::expense_records::Model,
        entities::receivables::Model,
        entities::faqs::Model,
        entities::page_contents::Model,
        entities::site_settings::Model,
        entities::seo_settings::Model,
        entities::email_templates::Model,
        entities::featured_creators::Model,
    ))
)]
struct ApiDoc;

/// Builds the router. Rate limiting is applied to the API routes only when
/// `RATE_LIMIT_PER_MINUTE` is set.
pub fn create_app(state: AppState) -> Router {
    let api_doc = ApiDoc::openapi();

    let api_routes = Router::new()
        .route("/health", get(health_check))
        // ledgers
        .route("/admin/points/history", get(routes::ledger::point_history))
        .route("/admin/points/history.csv", get(routes::ledger::point_history_csv))
        .route("/admin/withdrawals/audit", get(routes::ledger::withdrawal_audit))
        .route("/admin/withdrawals/audit.csv", get(routes::ledger::withdrawal_audit_csv))
        .route("/functions/check-unpaid-points", post(routes::ledger::check_unpaid_points))
        .route("/functions/award-bonus-points", post(routes::ledger::award_bonus_points))
        // payouts
        .route(
            "/withdrawals",
            get(routes::withdrawals::list_withdrawals).post(routes::withdrawals::request_withdrawal),
        )
        .route("/withdrawals/{id}", get(routes::withdrawals::get_withdrawal))
        .route("/withdrawals/{id}/approve", post(routes::withdrawals::approve_withdrawal))
        .route("/withdrawals/{id}/reject", post(routes::withdrawals::reject_withdrawal))
        .route("/withdrawals/{id}/complete", post(routes::withdrawals::complete_withdrawal))
        .route("/admin/withdrawals/weekly-report", get(routes::withdrawals::weekly_report))
        // campaigns
        .route("/functions/create-campaign", post(routes::campaigns::create_campaign))
        .route("/functions/update-campaign-status", post(routes::campaigns::update_campaign_status))
        .route("/campaigns", get(routes::campaigns::list_campaigns))
        .route(
            "/applications/{region}/{id}/status",
            post(routes::campaigns::update_application_status),
        )
        .route("/admin/revenue/regions", get(routes::campaigns::regional_revenue))
        // companies
        .route("/functions/update-company-profile", post(routes::companies::update_company_profile))
        .route("/companies/{user_id}", get(routes::companies::get_company))
        // finance
        .route(
            "/admin/finance/revenue",
            get(routes::finance::list_revenue).post(routes::finance::create_revenue),
        )
        .route("/admin/finance/revenue/import", post(routes::finance::import_revenue))
        .route(
            "/admin/finance/revenue/{id}",
            put(routes::finance::update_revenue).delete(routes::finance::delete_revenue),
        )
        .route("/admin/finance/revenue/{id}/tax-invoice", post(routes::finance::issue_tax_invoice))
        .route(
            "/admin/finance/expenses",
            get(routes::finance::list_expenses).post(routes::finance::create_expense),
        )
        .route(
            "/admin/finance/expenses/{id}",
            put(routes::finance::update_expense).delete(routes::finance::delete_expense),
        )
        .route("/admin/finance/summary", get(routes::finance::summary))
        .route("/admin/finance/month/{month}", get(routes::finance::month_profit_loss))
        .route("/admin/finance/receivables", get(routes::finance::list_receivables))
        .route("/admin/finance/receivables/{id}/paid", post(routes::finance::mark_receivable_paid))
        // cms
        .route("/cms/faqs", get(routes::cms::list_faqs).post(routes::cms::create_faq))
        .route("/cms/faqs/{id}", put(routes::cms::update_faq).delete(routes::cms::delete_faq))
        .route("/cms/pages/{key}", get(routes::cms::get_page).put(routes::cms::put_page))
        .route("/cms/settings/{key}", get(routes::cms::get_setting).put(routes::cms::put_setting))
        .route("/cms/seo/{*path}", get(routes::cms::get_seo).put(routes::cms::put_seo))
        .route(
            "/cms/email-templates/{key}",
            get(routes::cms::get_template).put(routes::cms::put_template),
        )
        .route(
            "/cms/featured-creators",
            get(routes::cms::list_featured).post(routes::cms::create_featured),
        )
        .route("/cms/featured-creators/{id}", axum::routing::delete(routes::cms::delete_featured))
        // integrations
        .route("/functions/fetch-youtube-data", post(routes::integrations::fetch_youtube_data))
        .route("/functions/translate", post(routes::integrations::translate))
        .route("/functions/send-email", post(routes::integrations::send_email));

    let api_routes = match state.config.rate_limit_per_minute.and_then(NonZeroU32::new) {
        Some(per_minute) => {
            let replenish = Duration::from_secs(60) / per_minute.get();
            match GovernorConfigBuilder::default()
                .key_extractor(SmartIpKeyExtractor)
                .period(replenish)
                .burst_size(per_minute.get())
                .finish()
            {
                Some(governor_conf) => {
                    tracing::info!("Rate limiting API routes to {} requests per minute", per_minute);
                    api_routes.layer(GovernorLayer {
                        config: Arc::new(governor_conf),
                    })
                }
                None => {
                    tracing::warn!("Invalid rate limit configuration, continuing without rate limiting");
                    api_routes
                }
            }
        }
        None => api_routes,
    };

    let docs_router = SwaggerUi::new("/docs").url("/api-doc/openapi.json", api_doc);

    Router::new()
        .merge(api_routes.with_state(state))
        .merge(docs_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
