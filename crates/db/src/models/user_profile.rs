use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "plan", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Starter,
    Pro,
}

#[derive(Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display)]
#[sqlx(type_name = "transaction_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransactionType {
    Purchase,
    Deduction,
    Refund,
    Grant,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct UserProfile {
    pub id: Uuid,
    pub credits: i64,
    pub plan: Plan,
    pub billing_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row per balance change; `balance_after` records the post-change
/// balance so the ledger can be audited without replaying it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct CreditTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub transaction_type: TransactionType,
    pub description: String,
    pub balance_after: i64,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    /// Fetch the profile, creating it with the signup grant on first touch.
    /// Concurrent first touches race on the INSERT; DO NOTHING makes the
    /// loser fall through to the SELECT.
    pub async fn ensure(
        pool: &SqlitePool,
        user_id: Uuid,
        initial_credits: i64,
    ) -> Result<Self, sqlx::Error> {
        let inserted = sqlx::query(
            "INSERT INTO user_profiles (id, credits) VALUES ($1, $2) ON CONFLICT(id) DO NOTHING",
        )
        .bind(user_id)
        .bind(initial_credits)
        .execute(pool)
        .await?;

        if inserted.rows_affected() > 0 && initial_credits > 0 {
            CreditTransaction::create(
                pool,
                user_id,
                initial_credits,
                TransactionType::Grant,
                "Signup credit grant",
                initial_credits,
            )
            .await?;
        }

        sqlx::query_as::<_, UserProfile>("SELECT * FROM user_profiles WHERE id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &SqlitePool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserProfile>("SELECT * FROM user_profiles WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Atomically deduct `amount` if the balance covers it. Returns the new
    /// balance, or None when the balance is insufficient (nothing changes).
    pub async fn try_deduct(
        pool: &SqlitePool,
        user_id: Uuid,
        amount: i64,
    ) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"UPDATE user_profiles
               SET credits = credits - $2, updated_at = datetime('now', 'subsec')
               WHERE id = $1 AND credits >= $2
               RETURNING credits"#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(pool)
        .await
    }

    /// Add credits unconditionally. Returns the new balance.
    pub async fn add_credits(
        pool: &SqlitePool,
        user_id: Uuid,
        amount: i64,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"UPDATE user_profiles
               SET credits = credits + $2, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING credits"#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_one(pool)
        .await
    }

    pub async fn set_billing_customer(
        pool: &SqlitePool,
        user_id: Uuid,
        customer_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"UPDATE user_profiles
               SET billing_customer_id = $2, updated_at = datetime('now', 'subsec')
               WHERE id = $1"#,
        )
        .bind(user_id)
        .bind(customer_id)
        .execute(pool)
        .await?;
        Ok(())
    }
}

impl CreditTransaction {
    pub async fn create(
        pool: &SqlitePool,
        user_id: Uuid,
        amount: i64,
        transaction_type: TransactionType,
        description: &str,
        balance_after: i64,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, CreditTransaction>(
            r#"INSERT INTO credit_transactions (id, user_id, amount, transaction_type, description, balance_after)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING *"#,
        )
        .bind(id)
        .bind(user_id)
        .bind(amount)
        .bind(transaction_type)
        .bind(description)
        .bind(balance_after)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_user_id(
        pool: &SqlitePool,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, CreditTransaction>(
            r#"SELECT * FROM credit_transactions
               WHERE user_id = $1
               ORDER BY created_at DESC
               LIMIT $2"#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
