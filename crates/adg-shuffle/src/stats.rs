use adg_schemas::{Purchase, ShuffleStats};

use crate::assignment::AssignmentPolicy;

/// Classify eligible records by whether they hold a position valid under `policy`.
///
/// Ineligible rows are skipped even if the store handed them over.
pub fn summarize(records: &[Purchase], policy: &AssignmentPolicy) -> ShuffleStats {
    let eligible: Vec<&Purchase> = records.iter().filter(|p| p.is_eligible()).collect();
    let valid = policy.valid_range(eligible.len());

    let mut stats = ShuffleStats {
        total_eligible: eligible.len() as u64,
        ..ShuffleStats::default()
    };

    for p in eligible {
        match p.position {
            Some(pos) if valid.contains(&pos) => {
                stats.already_positioned += 1;
                if let Some(ts) = p.last_shuffled_at {
                    stats.last_shuffled_at = Some(match stats.last_shuffled_at {
                        Some(cur) if cur >= ts => cur,
                        _ => ts,
                    });
                }
            }
            _ => stats.needs_shuffle += 1,
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use adg_schemas::{PaymentStatus, PurchaseStatus};
    use chrono::{TimeZone, Utc};

    fn purchase(id: &str, position: Option<i64>, hour: Option<u32>) -> Purchase {
        Purchase {
            id: id.to_string(),
            status: PurchaseStatus::Active,
            payment_status: PaymentStatus::Paid,
            logo_ref: Some("logos/x.png".to_string()),
            position,
            page: None,
            last_shuffled_at: hour.map(|h| Utc.with_ymd_and_hms(2026, 1, 2, h, 0, 0).unwrap()),
            shuffle_seed: None,
        }
    }

    #[test]
    fn empty_input_yields_zero_stats() {
        let stats = summarize(&[], &AssignmentPolicy::OrderingIndex);
        assert_eq!(stats, ShuffleStats::default());
        assert!(!stats.needs_shuffle());
    }

    #[test]
    fn classifies_positioned_and_unpositioned() {
        let records = vec![
            purchase("a", Some(0), Some(8)),
            purchase("b", Some(1), Some(10)),
            purchase("c", None, None),
        ];
        let stats = summarize(&records, &AssignmentPolicy::OrderingIndex);
        assert_eq!(stats.total_eligible, 3);
        assert_eq!(stats.already_positioned, 2);
        assert_eq!(stats.needs_shuffle, 1);
        assert_eq!(
            stats.last_shuffled_at,
            Some(Utc.with_ymd_and_hms(2026, 1, 2, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn out_of_range_index_needs_shuffle() {
        // Two eligible purchases; index 5 is left over from a larger set.
        let records = vec![purchase("a", Some(0), Some(8)), purchase("b", Some(5), Some(8))];
        let stats = summarize(&records, &AssignmentPolicy::OrderingIndex);
        assert_eq!(stats.already_positioned, 1);
        assert_eq!(stats.needs_shuffle, 1);
    }

    #[test]
    fn square_policy_accepts_any_square_in_grid() {
        let policy = AssignmentPolicy::SquarePool {
            total_squares: 2000,
            page_size: 200,
        };
        let records = vec![
            purchase("a", Some(1999), Some(8)),
            purchase("b", Some(0), Some(8)),
            purchase("c", Some(2001), Some(8)),
        ];
        let stats = summarize(&records, &policy);
        assert_eq!(stats.already_positioned, 1);
        assert_eq!(stats.needs_shuffle, 2);
    }

    #[test]
    fn ineligible_rows_are_ignored() {
        let mut cancelled = purchase("x", Some(0), Some(9));
        cancelled.status = PurchaseStatus::Cancelled;
        let stats = summarize(&[cancelled], &AssignmentPolicy::OrderingIndex);
        assert_eq!(stats, ShuffleStats::default());
    }
}
