// HTTP handlers, one module per area
pub mod campaigns;
pub mod cms;
pub mod companies;
pub mod finance;
pub mod integrations;
pub mod ledger;
pub mod withdrawals;

use axum::{
    extract::{FromRequest, FromRequestParts},
    Json,
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::region::Region;
use crate::AppState;

/// Success envelope shared by every JSON endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self { success: true, data })
    }
}

/// `Json` whose rejections use the error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

/// Empty payload for deletes.
#[derive(Debug, Serialize, ToSchema)]
pub struct Deleted {
    pub deleted: bool,
}

impl AppState {
    pub(crate) fn biz(&self) -> Result<&DatabaseConnection, AppError> {
        self.dbs.get(Region::Biz)
    }

    pub(crate) fn korea(&self) -> Result<&DatabaseConnection, AppError> {
        self.dbs.get(Region::Korea)
    }
}
