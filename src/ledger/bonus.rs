use sea_orm::{
    sea_query::{Expr, Func},
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::group_digits;
use crate::entities::{creator_points, featured_creators, notifications, system_settings};
use crate::error::AppError;
use crate::region::{Region, RegionalDatabases};

pub const BONUS_RATE_SETTING: &str = "affiliated_bonus_rate";

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct BonusRequest {
    pub campaign_id: Option<Uuid>,
    pub creator_id: Option<Uuid>,
    pub base_amount: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BonusOutcome {
    pub bonus_awarded: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bonus_amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bonus_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_total_points: Option<i64>,
}

impl BonusOutcome {
    fn skipped(message: &str) -> Self {
        Self {
            bonus_awarded: false,
            message: message.to_string(),
            bonus_amount: None,
            bonus_rate: None,
            creator_name: None,
            new_total_points: None,
        }
    }
}

pub fn bonus_amount(base_amount: i64, rate_percent: f64) -> i64 {
    (base_amount as f64 * rate_percent / 100.0).round() as i64
}

/// The configured rate, or `fallback` when the setting is missing or unparsable.
pub async fn bonus_rate<C: ConnectionTrait>(db: &C, fallback: f64) -> Result<f64, AppError> {
    let setting = system_settings::Entity::find()
        .filter(system_settings::Column::SettingKey.eq(BONUS_RATE_SETTING))
        .one(db)
        .await?;

    Ok(match setting {
        Some(s) => s.setting_value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Unparsable {} value {:?}, using {}", BONUS_RATE_SETTING, s.setting_value, fallback);
            fallback
        }),
        None => fallback,
    })
}

/// Pays an affiliated creator's campaign bonus once per campaign.
#[tracing::instrument(skip(dbs))]
pub async fn award_bonus(
    dbs: &RegionalDatabases,
    req: BonusRequest,
    default_rate: f64,
) -> Result<BonusOutcome, AppError> {
    let (Some(campaign_id), Some(creator_id), Some(base_amount)) =
        (req.campaign_id, req.creator_id, req.base_amount.filter(|a| *a > 0))
    else {
        return Err(AppError::InvalidRequest("필수 파라미터가 누락되었습니다.".to_string()));
    };

    let db = dbs.get(Region::Biz)?;
    let txn = db.begin().await?;

    let creator = featured_creators::Entity::find_by_id(creator_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("creator {}", creator_id)))?;

    if !creator.is_affiliated.unwrap_or(false) {
        return Ok(BonusOutcome::skipped(
            "소속 크리에이터가 아니므로 보너스 지급 대상이 아닙니다.",
        ));
    }

    let rate = bonus_rate(&txn, default_rate).await?;
    let amount = bonus_amount(base_amount, rate);

    let existing = creator_points::Entity::find()
        .filter(creator_points::Column::CreatorId.eq(creator_id))
        .filter(creator_points::Column::CampaignId.eq(campaign_id))
        .filter(creator_points::Column::PointType.eq("bonus"))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Ok(BonusOutcome::skipped("이미 보너스가 지급되었습니다."));
    }

    let now = chrono::Utc::now();
    creator_points::Entity::insert(creator_points::ActiveModel {
        id: Set(Uuid::new_v4()),
        creator_id: Set(creator_id),
        campaign_id: Set(Some(campaign_id)),
        amount: Set(amount),
        point_type: Set(Some("bonus".to_string())),
        description: Set(Some(format!("소속 크리에이터 보너스 {}% 지급", rate))),
        reason: Set(None),
        status: Set(Some("completed".to_string())),
        created_at: Set(now),
    })
    .exec_without_returning(&txn)
    .await?;

    featured_creators::Entity::update_many()
        .col_expr(
            featured_creators::Column::PointsBalance,
            Expr::expr(Func::coalesce([
                Expr::col(featured_creators::Column::PointsBalance).into(),
                Expr::value(0i64),
            ]))
            .add(amount),
        )
        .filter(featured_creators::Column::Id.eq(creator_id))
        .exec(&txn)
        .await?;
    let new_total = featured_creators::Entity::find_by_id(creator_id)
        .one(&txn)
        .await?
        .and_then(|c| c.points_balance)
        .unwrap_or(amount);
    txn.commit().await?;

    let notification = notifications::Entity::insert(notifications::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(creator.user_id),
        title: Set("🎉 보너스 포인트 지급".to_string()),
        message: Set(format!(
            "소속 크리에이터 보너스로 {}P가 지급되었습니다! ({}%)",
            group_digits(amount),
            rate
        )),
        notification_type: Set("point".to_string()),
        is_read: Set(false),
        created_at: Set(now),
    })
    .exec_without_returning(db)
    .await;
    if let Err(e) = notification {
        tracing::error!(?e, "bonus notification failed for creator {}", creator_id);
    }

    tracing::info!("Awarded {}P bonus ({}%) to creator {}", amount, rate, creator_id);

    Ok(BonusOutcome {
        bonus_awarded: true,
        message: "보너스 포인트가 지급되었습니다.".to_string(),
        bonus_amount: Some(amount),
        bonus_rate: Some(rate),
        creator_name: creator.name,
        new_total_points: Some(new_total),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn creator(id: Uuid, affiliated: bool) -> featured_creators::Model {
        featured_creators::Model {
            id,
            user_id: Some(Uuid::new_v4()),
            name: Some("Aiko".to_string()),
            channel_name: None,
            channel_url: None,
            email: None,
            region: Some("japan".to_string()),
            points_balance: Some(12_000),
            is_affiliated: Some(affiliated),
            subscriber_count: None,
            display_order: None,
            created_at: Utc::now(),
        }
    }

    fn ok_exec() -> MockExecResult {
        MockExecResult { last_insert_id: 0, rows_affected: 1 }
    }

    fn request(creator_id: Uuid) -> BonusRequest {
        BonusRequest {
            campaign_id: Some(Uuid::new_v4()),
            creator_id: Some(creator_id),
            base_amount: Some(35_000),
        }
    }

    #[test]
    fn rounds_half_up() {
        assert_eq!(bonus_amount(35_000, 10.0), 3_500);
        assert_eq!(bonus_amount(1_005, 10.0), 101);
        assert_eq!(bonus_amount(999, 12.5), 125);
    }

    #[tokio::test]
    async fn missing_parameters_are_rejected() {
        let err = award_bonus(&RegionalDatabases::default(), BonusRequest::default(), 10.0)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn non_affiliated_creator_gets_nothing() {
        let id = Uuid::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![creator(id, false)]])
            .into_connection();
        let dbs = RegionalDatabases::from_connections([(Region::Biz, db)]);

        let outcome = award_bonus(&dbs, request(id), 10.0).await.unwrap();
        assert!(!outcome.bonus_awarded);
    }

    #[tokio::test]
    async fn awards_with_configured_rate() {
        let id = Uuid::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![creator(id, true)]])
            .append_query_results([vec![system_settings::Model {
                id: Uuid::new_v4(),
                setting_key: BONUS_RATE_SETTING.to_string(),
                setting_value: "15".to_string(),
            }]])
            .append_query_results([Vec::<creator_points::Model>::new()])
            .append_query_results([vec![featured_creators::Model {
                points_balance: Some(17_250),
                ..creator(id, true)
            }]])
            .append_exec_results([ok_exec(), ok_exec(), ok_exec()])
            .into_connection();
        let dbs = RegionalDatabases::from_connections([(Region::Biz, match &db {
            sea_orm::DatabaseConnection::MockDatabaseConnection(conn) => sea_orm::DatabaseConnection::MockDatabaseConnection(conn.clone()),
            _ => unreachable!("mock connection"),
        })]);

        let outcome = award_bonus(&dbs, request(id), 10.0).await.unwrap();
        assert!(outcome.bonus_awarded);
        assert_eq!(outcome.bonus_amount, Some(5_250));
        assert_eq!(outcome.bonus_rate, Some(15.0));
        assert_eq!(outcome.new_total_points, Some(17_250));

        drop(dbs);
        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("COALESCE"), "{}", log);
    }

    #[tokio::test]
    async fn second_award_is_skipped() {
        let id = Uuid::new_v4();
        let existing = creator_points::Model {
            id: Uuid::new_v4(),
            creator_id: id,
            campaign_id: None,
            amount: 3_500,
            point_type: Some("bonus".to_string()),
            description: None,
            reason: None,
            status: Some("completed".to_string()),
            created_at: Utc::now(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![creator(id, true)]])
            .append_query_results([Vec::<system_settings::Model>::new()])
            .append_query_results([vec![existing]])
            .into_connection();
        let dbs = RegionalDatabases::from_connections([(Region::Biz, db)]);

        let outcome = award_bonus(&dbs, request(id), 10.0).await.unwrap();
        assert!(!outcome.bonus_awarded);
        assert_eq!(outcome.message, "이미 보너스가 지급되었습니다.");
    }
}
