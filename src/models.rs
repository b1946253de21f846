use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuthPayload {
    pub sub: String, // user id
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated caller. `user_id` is also the key of the caller's usage profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub user_id: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// Subscription tier. Only the billing flow changes it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Business,
    Agency,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Business => "business",
            Plan::Agency => "agency",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown plan {0:?} (expected free, business or agency)")]
pub struct UnknownPlan(pub String);

impl FromStr for Plan {
    type Err = UnknownPlan;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Plan::Free),
            "business" => Ok(Plan::Business),
            "agency" => Ok(Plan::Agency),
            _ => Err(UnknownPlan(s.to_string())),
        }
    }
}

/// Monthly generation allowance per plan. `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanLimits {
    pub free: Option<u32>,
    pub business: Option<u32>,
    pub agency: Option<u32>,
}

impl PlanLimits {
    pub const STANDARD: PlanLimits = PlanLimits {
        free: Some(2),
        business: Some(15),
        agency: None,
    };

    pub fn allowance(&self, plan: Plan) -> Option<u32> {
        match plan {
            Plan::Free => self.free,
            Plan::Business => self.business,
            Plan::Agency => self.agency,
        }
    }
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Per-user usage record, stored in the `profiles` tree keyed by user id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UsageProfile {
    pub id: String,
    pub plan: Plan,
    pub generations_used: u32,
    /// Start of the current counting window.
    pub generation_reset_date: DateTime<Utc>,
}

impl UsageProfile {
    pub fn new(id: impl Into<String>, plan: Plan, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            plan,
            generations_used: 0,
            generation_reset_date: now,
        }
    }
}
