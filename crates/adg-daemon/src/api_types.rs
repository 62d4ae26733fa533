//! Request and response bodies for the admin shuffle endpoints.
//!
//! JSON field names are camelCase to match what the admin dashboard reads.
//! `Serialize + Deserialize` so tests can decode what the router encodes.

use adg_schemas::ShuffleStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// POST /admin/shuffle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShuffleResponse {
    pub success: bool,
    pub message: String,
    pub shuffled_count: usize,
    pub batches: usize,
    /// Milliseconds.
    pub duration: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub run_id: Uuid,
    pub policy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vacant_squares: Option<usize>,
}

/// A run that started but did not finish. Counts are what was durably written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShuffleFailureResponse {
    pub success: bool,
    pub error: String,
    pub error_code: String,
    pub shuffled_count: usize,
    pub batches: usize,
    pub run_id: Uuid,
}

// ---------------------------------------------------------------------------
// Refusals (400 / 401 / 429 / 500 before any store access)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CooldownResponse {
    pub success: bool,
    pub error: String,
    /// Seconds until this identity may trigger again.
    pub cooldown_remaining: u64,
    /// Full cooldown window in seconds.
    pub cooldown_period: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitedResponse {
    pub success: bool,
    pub error: String,
    /// Seconds.
    pub retry_after: u64,
}

// ---------------------------------------------------------------------------
// GET /admin/shuffle/stats  GET /admin/shuffle/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub stats: ShuffleStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub success: bool,
    pub service: String,
    /// "operational" | "error"
    pub status: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<ShuffleStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
