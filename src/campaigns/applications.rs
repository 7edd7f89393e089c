use chrono::Utc;
use sea_orm::{
    sea_query::{Expr, Func},
    ColumnTrait, Condition, DatabaseTransaction, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::{applications, campaigns, point_transactions, user_profiles};
use crate::error::AppError;
use crate::region::{Region, RegionalDatabases};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Selected,
    Filming,
    GuideApproved,
    VideoSubmitted,
    Completed,
    Rejected,
}

impl ApplicationStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "selected" => Some(Self::Selected),
            "filming" => Some(Self::Filming),
            "guide_approved" => Some(Self::GuideApproved),
            "video_submitted" => Some(Self::VideoSubmitted),
            "completed" => Some(Self::Completed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Selected => "selected",
            Self::Filming => "filming",
            Self::GuideApproved => "guide_approved",
            Self::VideoSubmitted => "video_submitted",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }

    fn next(&self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Selected),
            Self::Selected => Some(Self::Filming),
            Self::Filming => Some(Self::GuideApproved),
            Self::GuideApproved => Some(Self::VideoSubmitted),
            Self::VideoSubmitted => Some(Self::Completed),
            Self::Completed | Self::Rejected => None,
        }
    }

    /// One step forward, or rejection from anything not yet finished.
    pub fn can_move_to(&self, target: ApplicationStatus) -> bool {
        match target {
            Self::Rejected => !matches!(self, Self::Completed | Self::Rejected),
            _ => self.next() == Some(target),
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ApplicationStatusChange {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ApplicationUpdate {
    pub application: applications::Model,
    /// Points credited when the application completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_points: Option<i64>,
}

/// Credits the campaign reward for a completed application.
async fn pay_campaign_reward(txn: &DatabaseTransaction, app: &applications::Model) -> Result<i64, AppError> {
    let already_paid = point_transactions::Entity::find()
        .filter(point_transactions::Column::UserId.eq(app.user_id))
        .filter(point_transactions::Column::RelatedCampaignId.eq(app.campaign_id))
        .one(txn)
        .await?;
    if already_paid.is_some() {
        return Err(AppError::Conflict("이미 캠페인 포인트가 지급되었습니다.".to_string()));
    }

    let campaign = campaigns::Entity::find_by_id(app.campaign_id)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::UnprocessableEntity("캠페인 정보 조회 실패".to_string()))?;
    let reward = campaign.payout_points();
    if reward <= 0 {
        return Err(AppError::UnprocessableEntity("보상 포인트 미설정".to_string()));
    }

    let profile = user_profiles::Entity::find()
        .filter(
            Condition::any()
                .add(user_profiles::Column::Id.eq(app.user_id))
                .add(user_profiles::Column::UserId.eq(app.user_id)),
        )
        .one(txn)
        .await?
        .ok_or_else(|| AppError::UnprocessableEntity("크리에이터 프로필 없음".to_string()))?;

    user_profiles::Entity::update_many()
        .col_expr(
            user_profiles::Column::Points,
            Expr::expr(Func::coalesce([Expr::col(user_profiles::Column::Points).into(), Expr::value(0i64)]))
                .add(reward),
        )
        .filter(user_profiles::Column::Id.eq(profile.id))
        .exec(txn)
        .await?;

    point_transactions::Entity::insert(point_transactions::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(Some(app.user_id)),
        amount: Set(reward),
        transaction_type: Set("campaign_reward".to_string()),
        description: Set(Some(format!("[캠페인명: {}] 캠페인 완료 보상", campaign.title))),
        related_campaign_id: Set(Some(app.campaign_id)),
        created_at: Set(Utc::now()),
    })
    .exec_without_returning(txn)
    .await?;

    Ok(reward)
}

/// Moves an application along its lifecycle. Completion pays the reward in
/// the same transaction as the status change.
#[tracing::instrument(skip(dbs))]
pub async fn update_application_status(
    dbs: &RegionalDatabases,
    region: Region,
    id: Uuid,
    status: &str,
) -> Result<ApplicationUpdate, AppError> {
    let target = ApplicationStatus::parse(status)
        .ok_or_else(|| AppError::InvalidRequest("유효하지 않은 상태값입니다.".to_string()))?;
    let db = dbs.get(region)?;

    let txn = db.begin().await?;
    let mut app = applications::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("application {}", id)))?;

    let allowed = ApplicationStatus::parse(&app.status).is_some_and(|current| current.can_move_to(target));
    if !allowed {
        return Err(AppError::Conflict(format!(
            "{} 상태의 지원서는 {}(으)로 변경할 수 없습니다.",
            app.status,
            target.as_str()
        )));
    }

    let paid_points = match target {
        ApplicationStatus::Completed => Some(pay_campaign_reward(&txn, &app).await?),
        _ => None,
    };

    // applications carry updated_at in every region, unlike campaigns
    let now = Utc::now();
    applications::Entity::update_many()
        .col_expr(applications::Column::Status, Expr::value(target.as_str()))
        .col_expr(applications::Column::UpdatedAt, Expr::value(now))
        .filter(applications::Column::Id.eq(id))
        .exec(&txn)
        .await?;
    txn.commit().await?;

    tracing::info!("Application {} ({}) -> {}", id, region, target.as_str());
    app.status = target.as_str().to_string();
    app.updated_at = Some(now);
    Ok(ApplicationUpdate { application: app, paid_points })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn application(status: &str) -> applications::Model {
        applications::Model {
            id: Uuid::new_v4(),
            campaign_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            status: status.to_string(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn ok_exec() -> MockExecResult {
        MockExecResult { last_insert_id: 0, rows_affected: 1 }
    }

    #[test]
    fn lifecycle_steps_forward_only() {
        use ApplicationStatus::*;
        assert!(Pending.can_move_to(Selected));
        assert!(GuideApproved.can_move_to(VideoSubmitted));
        assert!(!Pending.can_move_to(Completed));
        assert!(!VideoSubmitted.can_move_to(Filming));
        assert!(Filming.can_move_to(Rejected));
        assert!(!Completed.can_move_to(Rejected));
    }

    #[tokio::test]
    async fn skipping_steps_is_a_conflict() {
        let app = application("pending");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![app.clone()]])
            .into_connection();
        let dbs = RegionalDatabases::from_connections([(Region::Korea, db)]);

        let err = update_application_status(&dbs, Region::Korea, app.id, "completed")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn completion_pays_reward() {
        let app = application("video_submitted");
        let campaign = campaigns::Model {
            id: app.campaign_id,
            title: "가을 립 캠페인".to_string(),
            brand: None,
            status: "active".to_string(),
            campaign_type: None,
            reward_points: Some(30_000),
            creator_points_override: Some(45_000),
            video_count: None,
            estimated_cost: None,
            payment_status: None,
            payment_confirmed_at: None,
            company_email: None,
            application_deadline: None,
            created_at: Utc::now(),
        };
        let profile = user_profiles::Model {
            id: app.user_id,
            user_id: None,
            name: Some("한유진".to_string()),
            channel_name: None,
            email: None,
            phone: None,
            points: Some(5_000),
        };

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![app.clone()]])
            .append_query_results([Vec::<point_transactions::Model>::new()])
            .append_query_results([vec![campaign]])
            .append_query_results([vec![profile]])
            .append_exec_results([ok_exec(), ok_exec(), ok_exec()])
            .into_connection();
        let dbs = RegionalDatabases::from_connections([(Region::Japan, db)]);

        let update = update_application_status(&dbs, Region::Japan, app.id, "completed")
            .await
            .unwrap();
        assert_eq!(update.paid_points, Some(45_000));
        assert_eq!(update.application.status, "completed");
        assert!(update.application.updated_at.is_some());
    }

    #[tokio::test]
    async fn japan_and_us_transitions_stamp_updated_at() {
        for region in [Region::Japan, Region::Us] {
            let app = application("selected");
            let db = MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![app.clone()]])
                .append_exec_results([ok_exec()])
                .into_connection();
            let dbs = RegionalDatabases::from_connections([(region, match &db {
            sea_orm::DatabaseConnection::MockDatabaseConnection(conn) => sea_orm::DatabaseConnection::MockDatabaseConnection(conn.clone()),
            _ => unreachable!("mock connection"),
        })]);

            let update = update_application_status(&dbs, region, app.id, "filming").await.unwrap();
            assert_eq!(update.application.status, "filming");
            assert!(update.application.updated_at.is_some(), "{region} left updated_at empty");

            drop(dbs);
            let log = format!("{:?}", db.into_transaction_log());
            assert!(log.contains("\"updated_at\""), "{region} UPDATE missing updated_at: {log}");
        }
    }

    #[tokio::test]
    async fn unknown_status_is_rejected_before_lookup() {
        let err = update_application_status(&RegionalDatabases::default(), Region::Korea, Uuid::new_v4(), "shipped")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }
}
