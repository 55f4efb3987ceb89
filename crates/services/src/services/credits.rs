//! Credit accounting: every paid tool run is charged up front through a
//! single conditional UPDATE so concurrent requests cannot overspend, and
//! every balance change appends one ledger row.

use db::models::user_profile::{CreditTransaction, TransactionType, UserProfile};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CreditError {
    #[error("Insufficient credits")]
    Insufficient { required: i64, balance: i64 },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Paid tools, with their fixed credit costs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display, Hash,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolKind {
    MarketResearch,
    BrandIdentity,
    Website,
    LeadWebsite,
    Leads,
    Ads,
    Outreach,
}

impl ToolKind {
    pub fn cost(&self) -> i64 {
        match self {
            Self::MarketResearch => 5,
            Self::BrandIdentity => 5,
            Self::Website => 25,
            Self::LeadWebsite => 15,
            Self::Leads => 10,
            Self::Ads => 10,
            Self::Outreach => 5,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::MarketResearch => "Market research",
            Self::BrandIdentity => "Brand identity",
            Self::Website => "Website generation",
            Self::LeadWebsite => "Lead demo site",
            Self::Leads => "Lead generation",
            Self::Ads => "Ad generation",
            Self::Outreach => "Outreach scripts",
        }
    }
}

/// Receipt for a successful charge.
#[derive(Debug, Clone)]
pub struct CreditCharge {
    pub tool: ToolKind,
    pub amount: i64,
    pub balance_after: i64,
}

#[derive(Clone)]
pub struct CreditService {
    pool: SqlitePool,
    signup_grant: i64,
}

impl CreditService {
    pub fn new(pool: SqlitePool, signup_grant: i64) -> Self {
        Self { pool, signup_grant }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Fetch the profile, creating it with the signup grant on first touch.
    pub async fn profile(&self, user_id: Uuid) -> Result<UserProfile, CreditError> {
        Ok(UserProfile::ensure(&self.pool, user_id, self.signup_grant).await?)
    }

    /// Charge a tool run. The deduction is a single conditional UPDATE;
    /// on insufficient balance nothing is written.
    pub async fn charge(&self, user_id: Uuid, tool: ToolKind) -> Result<CreditCharge, CreditError> {
        let cost = tool.cost();
        let profile = self.profile(user_id).await?;

        let Some(balance_after) = UserProfile::try_deduct(&self.pool, user_id, cost).await? else {
            return Err(CreditError::Insufficient {
                required: cost,
                balance: profile.credits,
            });
        };

        CreditTransaction::create(
            &self.pool,
            user_id,
            -cost,
            TransactionType::Deduction,
            &format!("{} run", tool.label()),
            balance_after,
        )
        .await?;

        info!(user_id = %user_id, tool = %tool, cost, balance_after, "charged credits");

        Ok(CreditCharge {
            tool,
            amount: cost,
            balance_after,
        })
    }

    /// Return a charge after a failed or cancelled run.
    pub async fn refund(&self, user_id: Uuid, charge: &CreditCharge) -> Result<i64, CreditError> {
        let balance_after =
            UserProfile::add_credits(&self.pool, user_id, charge.amount).await?;
        CreditTransaction::create(
            &self.pool,
            user_id,
            charge.amount,
            TransactionType::Refund,
            &format!("{} refund", charge.tool.label()),
            balance_after,
        )
        .await?;
        info!(user_id = %user_id, tool = %charge.tool, amount = charge.amount, "refunded credits");
        Ok(balance_after)
    }

    /// Add purchased or granted credits.
    pub async fn add(
        &self,
        user_id: Uuid,
        amount: i64,
        transaction_type: TransactionType,
        description: &str,
    ) -> Result<i64, CreditError> {
        // Make sure the profile row exists before touching the balance
        self.profile(user_id).await?;
        let balance_after = UserProfile::add_credits(&self.pool, user_id, amount).await?;
        CreditTransaction::create(
            &self.pool,
            user_id,
            amount,
            transaction_type,
            description,
            balance_after,
        )
        .await?;
        Ok(balance_after)
    }

    pub async fn transactions(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<CreditTransaction>, CreditError> {
        Ok(CreditTransaction::find_by_user_id(&self.pool, user_id, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_costs_are_positive() {
        for tool in [
            ToolKind::MarketResearch,
            ToolKind::BrandIdentity,
            ToolKind::Website,
            ToolKind::LeadWebsite,
            ToolKind::Leads,
            ToolKind::Ads,
            ToolKind::Outreach,
        ] {
            assert!(tool.cost() > 0);
        }
    }

    #[test]
    fn test_insufficient_error_message_is_stable() {
        let err = CreditError::Insufficient {
            required: 10,
            balance: 3,
        };
        assert_eq!(err.to_string(), "Insufficient credits");
    }

    #[tokio::test]
    async fn test_charge_writes_one_deduction_row() {
        let db = db::DBService::new_in_memory().await.unwrap();
        let service = CreditService::new(db.pool.clone(), 50);
        let user = Uuid::new_v4();

        let charge = service.charge(user, ToolKind::BrandIdentity).await.unwrap();
        assert_eq!(charge.amount, 5);
        assert_eq!(charge.balance_after, 45);

        let transactions = service.transactions(user, 10).await.unwrap();
        // signup grant + deduction
        assert_eq!(transactions.len(), 2);
        let deduction = transactions
            .iter()
            .find(|t| t.transaction_type == TransactionType::Deduction)
            .unwrap();
        assert_eq!(deduction.amount, -5);
        assert_eq!(deduction.balance_after, 45);
    }

    #[tokio::test]
    async fn test_insufficient_balance_leaves_ledger_untouched() {
        let db = db::DBService::new_in_memory().await.unwrap();
        let service = CreditService::new(db.pool.clone(), 10);
        let user = Uuid::new_v4();

        let err = service.charge(user, ToolKind::Website).await.unwrap_err();
        assert!(matches!(
            err,
            CreditError::Insufficient {
                required: 25,
                balance: 10
            }
        ));

        let profile = service.profile(user).await.unwrap();
        assert_eq!(profile.credits, 10);
        // only the signup grant is in the ledger
        assert_eq!(service.transactions(user, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_refund_restores_the_charge() {
        let db = db::DBService::new_in_memory().await.unwrap();
        let service = CreditService::new(db.pool.clone(), 50);
        let user = Uuid::new_v4();

        let charge = service.charge(user, ToolKind::Leads).await.unwrap();
        let balance = service.refund(user, &charge).await.unwrap();
        assert_eq!(balance, 50);

        let transactions = service.transactions(user, 10).await.unwrap();
        assert_eq!(transactions.len(), 3); // grant, deduction, refund
        assert!(
            transactions
                .iter()
                .any(|t| t.transaction_type == TransactionType::Refund && t.amount == 10)
        );
    }
}
