//! Repository for per-user subscriptions and chat quota counters.

use sqlx::SqlitePool;
use tracing::info;

use crate::entities::{NewSubscription, Subscription, SubscriptionStatus};
use crate::types::{timestamp, DatabaseError, DatabaseResult};

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, plan, payment_cycle, status, start_date, end_date,
     chat_limit, chats_used, had_trial, created_at, updated_at";

#[derive(Clone)]
pub struct SubscriptionRepository {
    pool: SqlitePool,
}

impl SubscriptionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_for_user(&self, user_id: i64) -> DatabaseResult<Option<Subscription>> {
        let sql = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE user_id = ?");
        let subscription = sqlx::query_as::<_, Subscription>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(subscription)
    }

    /// Insert or replace the user's subscription. The usage counter restarts at zero.
    pub async fn upsert(&self, request: &NewSubscription) -> DatabaseResult<Subscription> {
        let now = timestamp();
        sqlx::query(
            "INSERT INTO subscriptions (user_id, plan, payment_cycle, status, start_date,
                end_date, chat_limit,
                chats_used, had_trial, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                plan = excluded.plan,
                payment_cycle = excluded.payment_cycle,
                status = excluded.status,
                start_date = excluded.start_date,
                end_date = excluded.end_date,
                chat_limit = excluded.chat_limit,
                chats_used = 0,
                had_trial = MAX(subscriptions.had_trial, excluded.had_trial),
                updated_at = excluded.updated_at",
        )
        .bind(request.user_id)
        .bind(request.plan.as_str())
        .bind(request.payment_cycle.as_str())
        .bind(request.status.as_str())
        .bind(&request.start_date)
        .bind(&request.end_date)
        .bind(request.chat_limit)
        .bind(request.had_trial)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        info!(
            user_id = request.user_id,
            plan = request.plan.as_str(),
            status = request.status.as_str(),
            "subscription saved"
        );

        let subscription = self.find_for_user(request.user_id).await?;
        subscription.ok_or_else(|| {
            DatabaseError::NotFound(format!("subscription for user {}", request.user_id))
        })
    }

    pub async fn set_status(
        &self,
        subscription_id: i64,
        status: SubscriptionStatus,
    ) -> DatabaseResult<()> {
        sqlx::query("UPDATE subscriptions SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(timestamp())
            .bind(subscription_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Count one chat against the quota. Returns false when the limit is already reached;
    /// the check and the increment happen in a single statement.
    pub async fn try_consume_chat(&self, subscription_id: i64) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "UPDATE subscriptions SET chats_used = chats_used + 1, updated_at = ?
             WHERE id = ? AND (chat_limit IS NULL OR chats_used < chat_limit)",
        )
        .bind(timestamp())
        .bind(subscription_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Subscriptions that are active or trialing and not past their end date.
    pub async fn count_current(&self) -> DatabaseResult<i64> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM subscriptions
             WHERE status IN ('active', 'trial') AND (end_date IS NULL OR end_date > ?)",
        )
        .bind(timestamp())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
