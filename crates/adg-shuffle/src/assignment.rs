//! Turns a permuted purchase order into position writes.
//!
//! The policy is fixed when the engine is built. `OrderingIndex` hands out
//! `0..count` and leaves the square mapping to the renderer. `SquarePool`
//! shuffles the whole square range and gives the first `count` squares away;
//! the rest are vacant after the run.

use std::fmt;
use std::ops::Range;

use adg_schemas::{PositionWrite, Purchase};
use chrono::{DateTime, Utc};

use crate::permutation::{shuffle_in_place, RandomSource};

pub const DEFAULT_TOTAL_SQUARES: u32 = 2000;
pub const DEFAULT_PAGE_SIZE: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentPolicy {
    OrderingIndex,
    SquarePool { total_squares: u32, page_size: u32 },
}

impl AssignmentPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentPolicy::OrderingIndex => "ordering_index",
            AssignmentPolicy::SquarePool { .. } => "square_pool",
        }
    }

    /// Positions a record may legitimately hold when `eligible` purchases exist.
    pub fn valid_range(&self, eligible: usize) -> Range<i64> {
        match *self {
            AssignmentPolicy::OrderingIndex => 0..eligible as i64,
            AssignmentPolicy::SquarePool { total_squares, .. } => 1..i64::from(total_squares) + 1,
        }
    }
}

/// `ceil(position / page_size)` for a 1-based square number.
pub fn page_for(position: i64, page_size: u32) -> i64 {
    let size = i64::from(page_size.max(1));
    (position + size - 1) / size
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityExceeded {
    pub eligible: usize,
    pub total_squares: u32,
}

impl fmt::Display for CapacityExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} eligible purchases do not fit into {} squares",
            self.eligible, self.total_squares
        )
    }
}

impl std::error::Error for CapacityExceeded {}

#[derive(Debug, Clone)]
pub struct AssignmentPlan {
    /// One write per purchase, in permuted order.
    pub writes: Vec<PositionWrite>,
    /// Squares left without an eligible purchase (square policy only).
    pub vacant_squares: Option<usize>,
}

/// Assign positions to `permuted` under `policy`.
///
/// The square policy draws its square shuffle from the same `source`, so a
/// seeded run stays reproducible end to end.
pub fn plan_assignments(
    policy: &AssignmentPolicy,
    permuted: &[Purchase],
    source: &mut dyn RandomSource,
    shuffled_at: DateTime<Utc>,
) -> Result<AssignmentPlan, CapacityExceeded> {
    let seed = source.seed().and_then(|s| i64::try_from(s).ok());

    match *policy {
        AssignmentPolicy::OrderingIndex => {
            let writes = permuted
                .iter()
                .enumerate()
                .map(|(idx, p)| PositionWrite {
                    purchase_id: p.id.clone(),
                    position: idx as i64,
                    page: None,
                    shuffled_at,
                    seed,
                })
                .collect();
            Ok(AssignmentPlan {
                writes,
                vacant_squares: None,
            })
        }

        AssignmentPolicy::SquarePool {
            total_squares,
            page_size,
        } => {
            if permuted.len() > total_squares as usize {
                return Err(CapacityExceeded {
                    eligible: permuted.len(),
                    total_squares,
                });
            }

            let mut squares: Vec<i64> = (1..=i64::from(total_squares)).collect();
            shuffle_in_place(&mut squares, source);

            let writes = permuted
                .iter()
                .zip(squares.iter())
                .map(|(p, &square)| PositionWrite {
                    purchase_id: p.id.clone(),
                    position: square,
                    page: Some(page_for(square, page_size)),
                    shuffled_at,
                    seed,
                })
                .collect();
            Ok(AssignmentPlan {
                writes,
                vacant_squares: Some(total_squares as usize - permuted.len()),
            })
        }
    }
}
