//! Test support for the shuffle workspace.
//!
//! - [`MemoryPurchaseStore`]: in-process purchase store with failure injection
//! - [`ManualClock`]: clock driven by the test
//! - fixtures for eligible / ineligible purchases
//!
//! Cross-crate scenario tests live under `tests/`.

mod clock;
mod store;

pub use clock::ManualClock;
pub use store::MemoryPurchaseStore;

use adg_schemas::{PaymentStatus, Purchase, PurchaseStatus};

pub fn purchase_with(
    id: &str,
    status: PurchaseStatus,
    payment_status: PaymentStatus,
    logo_ref: Option<&str>,
) -> Purchase {
    Purchase {
        id: id.to_string(),
        status,
        payment_status,
        logo_ref: logo_ref.map(str::to_string),
        position: None,
        page: None,
        last_shuffled_at: None,
        shuffle_seed: None,
    }
}

pub fn eligible_purchase(id: &str) -> Purchase {
    let logo = format!("logos/{id}.png");
    purchase_with(
        id,
        PurchaseStatus::Active,
        PaymentStatus::Paid,
        Some(logo.as_str()),
    )
}

/// `n` eligible purchases with ids `sq-00000`, `sq-00001`, ...
pub fn eligible_purchases(n: usize) -> Vec<Purchase> {
    (0..n)
        .map(|i| eligible_purchase(&format!("sq-{i:05}")))
        .collect()
}
