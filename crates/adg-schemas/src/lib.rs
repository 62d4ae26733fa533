//! adg-schemas
//!
//! Record shapes shared by the shuffle engine, the store adapters and the daemon.
//! No IO and no business rules beyond the eligibility filter.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Statuses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Active,
    Pending,
    Cancelled,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Active => "active",
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(PurchaseStatus::Active),
            "pending" => Ok(PurchaseStatus::Pending),
            "cancelled" => Ok(PurchaseStatus::Cancelled),
            other => Err(anyhow!("invalid purchase status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Pending,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "paid" => Ok(PaymentStatus::Paid),
            "pending" => Ok(PaymentStatus::Pending),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(anyhow!("invalid payment status: {}", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Purchase
// ---------------------------------------------------------------------------

/// One advertising campaign purchase as held by the purchase store.
///
/// The shuffle engine only ever changes `position`, `page`, `last_shuffled_at`
/// and `shuffle_seed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: String,
    pub status: PurchaseStatus,
    pub payment_status: PaymentStatus,
    /// Logo / image reference rendered in the square. Blank means nothing to show.
    pub logo_ref: Option<String>,
    /// Square number (`1..=N`) or ordering index (`0..count`), depending on the
    /// assignment policy that last wrote it.
    pub position: Option<i64>,
    pub page: Option<i64>,
    pub last_shuffled_at: Option<DateTime<Utc>>,
    pub shuffle_seed: Option<i64>,
}

impl Purchase {
    pub fn has_displayable_content(&self) -> bool {
        self.logo_ref
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false)
    }

    /// Active, paid, and something to render. Only these take part in a shuffle.
    pub fn is_eligible(&self) -> bool {
        self.status == PurchaseStatus::Active
            && self.payment_status == PaymentStatus::Paid
            && self.has_displayable_content()
    }
}

// ---------------------------------------------------------------------------
// Writes + stats
// ---------------------------------------------------------------------------

/// One position update produced by a shuffle run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionWrite {
    pub purchase_id: String,
    pub position: i64,
    /// `None` under the ordering-index policy (page is derived downstream).
    pub page: Option<i64>,
    pub shuffled_at: DateTime<Utc>,
    pub seed: Option<i64>,
}

/// Aggregate view over the eligible purchases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShuffleStats {
    pub total_eligible: u64,
    /// Eligible purchases holding a position valid under the active policy.
    pub already_positioned: u64,
    /// Eligible purchases without a valid position.
    pub needs_shuffle: u64,
    pub last_shuffled_at: Option<DateTime<Utc>>,
}

impl ShuffleStats {
    pub fn needs_shuffle(&self) -> bool {
        self.needs_shuffle > 0
    }
}
