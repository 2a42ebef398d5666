//! Subscription entity definitions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use super::decode_error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Basic,
    Premium,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Basic => "basic",
            Plan::Premium => "premium",
        }
    }
}

impl FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Plan::Basic),
            "premium" => Ok(Plan::Premium),
            other => Err(format!("unknown plan '{other}'")),
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentCycle {
    #[default]
    Monthly,
    Yearly,
}

impl PaymentCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentCycle::Monthly => "monthly",
            PaymentCycle::Yearly => "yearly",
        }
    }
}

impl FromStr for PaymentCycle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(PaymentCycle::Monthly),
            "yearly" => Ok(PaymentCycle::Yearly),
            other => Err(format!("unknown payment cycle '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    PastDue,
    Trial,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Trial => "trial",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "trial" => Ok(SubscriptionStatus::Trial),
            "expired" => Ok(SubscriptionStatus::Expired),
            other => Err(format!("unknown subscription status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub plan: Plan,
    pub payment_cycle: PaymentCycle,
    pub status: SubscriptionStatus,
    pub start_date: String,
    pub end_date: Option<String>,
    /// `None` means unlimited.
    pub chat_limit: Option<i64>,
    pub chats_used: i64,
    pub had_trial: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Subscription {
    /// Active or trialing, and not past its end date. `now` uses the stored timestamp format.
    pub fn is_current(&self, now: &str) -> bool {
        let live = matches!(
            self.status,
            SubscriptionStatus::Active | SubscriptionStatus::Trial
        );
        live && self.end_date.as_deref().map_or(true, |end| end > now)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Subscription {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let plan: String = row.try_get("plan")?;
        let cycle: String = row.try_get("payment_cycle")?;
        let status: String = row.try_get("status")?;
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            plan: plan.parse().map_err(|e| decode_error("plan", e))?,
            payment_cycle: cycle.parse().map_err(|e| decode_error("payment_cycle", e))?,
            status: status.parse().map_err(|e| decode_error("status", e))?,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
            chat_limit: row.try_get("chat_limit")?,
            chats_used: row.try_get("chats_used")?,
            had_trial: row.try_get("had_trial")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Values written when a subscription is started or replaced.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub user_id: i64,
    pub plan: Plan,
    pub payment_cycle: PaymentCycle,
    pub status: SubscriptionStatus,
    pub start_date: String,
    pub end_date: Option<String>,
    pub chat_limit: Option<i64>,
    pub had_trial: bool,
}
