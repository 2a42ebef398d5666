//! Plan catalogue, trials and per-message chat quotas.

use chrono::{Duration, Utc};
use helpmate_database::{
    format_timestamp, timestamp, NewSubscription, PaymentCycle, Plan, Subscription,
    SubscriptionRepository, SubscriptionStatus,
};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{ChatError, ChatResult};

pub const TRIAL_DAYS: i64 = 14;

/// Static description of a plan. Prices are in paise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDetails {
    pub id: Plan,
    pub name: &'static str,
    pub description: &'static str,
    pub monthly_price: i64,
    pub yearly_price: i64,
    /// `None` means unlimited.
    pub chat_limit: Option<i64>,
    pub features: &'static [&'static str],
}

const BASIC: PlanDetails = PlanDetails {
    id: Plan::Basic,
    name: "Basic Plan",
    description: "For small businesses",
    monthly_price: 99_900,
    yearly_price: 999_900,
    chat_limit: Some(500),
    features: &[
        "500 AI chat interactions per month",
        "Website chat widget",
        "Email support",
        "Basic analytics",
    ],
};

const PREMIUM: PlanDetails = PlanDetails {
    id: Plan::Premium,
    name: "Premium Plan",
    description: "For growing businesses",
    monthly_price: 249_900,
    yearly_price: 2_499_900,
    chat_limit: None,
    features: &[
        "Unlimited AI chat interactions",
        "Advanced widget customization",
        "Knowledge base integration",
        "Priority support",
        "Advanced analytics and reporting",
        "Multiple website integrations",
    ],
};

pub fn plans() -> Vec<PlanDetails> {
    vec![BASIC, PREMIUM]
}

pub fn plan_details(plan: Plan) -> PlanDetails {
    match plan {
        Plan::Basic => BASIC,
        Plan::Premium => PREMIUM,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    pub plan: Plan,
    pub payment_cycle: PaymentCycle,
    pub status: SubscriptionStatus,
    pub start_date: String,
    pub end_date: Option<String>,
    pub chat_limit: Option<i64>,
    pub chats_used: i64,
    pub had_trial: bool,
    pub plan_details: PlanDetails,
}

impl From<Subscription> for SubscriptionView {
    fn from(subscription: Subscription) -> Self {
        Self {
            plan_details: plan_details(subscription.plan),
            plan: subscription.plan,
            payment_cycle: subscription.payment_cycle,
            status: subscription.status,
            start_date: subscription.start_date,
            end_date: subscription.end_date,
            chat_limit: subscription.chat_limit,
            chats_used: subscription.chats_used,
            had_trial: subscription.had_trial,
        }
    }
}

#[derive(Clone)]
pub struct SubscriptionService {
    repository: SubscriptionRepository,
}

impl SubscriptionService {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            repository: SubscriptionRepository::new(pool),
        }
    }

    pub async fn current(&self, user_id: i64) -> ChatResult<SubscriptionView> {
        let subscription = self
            .repository
            .find_for_user(user_id)
            .await?
            .ok_or(ChatError::SubscriptionNotFound)?;
        Ok(subscription.into())
    }

    /// Fourteen days of the basic plan, once per user.
    pub async fn start_trial(&self, user_id: i64) -> ChatResult<SubscriptionView> {
        let now = Utc::now();
        if let Some(existing) = self.repository.find_for_user(user_id).await? {
            if existing.had_trial {
                return Err(ChatError::TrialAlreadyUsed);
            }
            if existing.status == SubscriptionStatus::Active
                && existing.is_current(&format_timestamp(now))
            {
                return Err(ChatError::AlreadySubscribed);
            }
        }

        let subscription = self
            .repository
            .upsert(&NewSubscription {
                user_id,
                plan: Plan::Basic,
                payment_cycle: PaymentCycle::Monthly,
                status: SubscriptionStatus::Trial,
                start_date: format_timestamp(now),
                end_date: Some(format_timestamp(now + Duration::days(TRIAL_DAYS))),
                chat_limit: BASIC.chat_limit,
                had_trial: true,
            })
            .await?;

        info!(user_id, "free trial started");
        Ok(subscription.into())
    }

    /// Cancel an active or trial subscription. Access ends at the current period's end.
    pub async fn cancel(&self, user_id: i64) -> ChatResult<SubscriptionView> {
        let mut subscription = self
            .repository
            .find_for_user(user_id)
            .await?
            .ok_or(ChatError::SubscriptionNotFound)?;

        if !matches!(subscription.status, SubscriptionStatus::Active | SubscriptionStatus::Trial) {
            return Err(ChatError::SubscriptionInactive);
        }

        self.repository
            .set_status(subscription.id, SubscriptionStatus::Cancelled)
            .await?;
        subscription.status = SubscriptionStatus::Cancelled;

        info!(user_id, "subscription cancelled");
        Ok(subscription.into())
    }

    /// Count one chat message against the user's quota.
    ///
    /// Users without a current subscription, or on an unlimited plan, are let
    /// through uncounted. A lapsed subscription is marked expired on the way.
    pub async fn check_and_count(&self, user_id: i64) -> ChatResult<()> {
        let Some(subscription) = self.repository.find_for_user(user_id).await? else {
            return Ok(());
        };

        if !subscription.is_current(&timestamp()) {
            if matches!(
                subscription.status,
                SubscriptionStatus::Active | SubscriptionStatus::Trial
            ) {
                self.repository
                    .set_status(subscription.id, SubscriptionStatus::Expired)
                    .await?;
                info!(user_id, "subscription expired");
            }
            return Ok(());
        }

        if subscription.chat_limit.is_none() {
            return Ok(());
        }

        if !self.repository.try_consume_chat(subscription.id).await? {
            debug!(user_id, "chat quota exhausted");
            return Err(ChatError::QuotaExceeded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_matches_pricing() {
        let catalogue = plans();
        assert_eq!(catalogue.len(), 2);
        assert_eq!(plan_details(Plan::Basic).chat_limit, Some(500));
        assert_eq!(plan_details(Plan::Basic).monthly_price, 99_900);
        assert_eq!(plan_details(Plan::Premium).yearly_price, 2_499_900);
        assert!(plan_details(Plan::Premium).chat_limit.is_none());
    }
}
