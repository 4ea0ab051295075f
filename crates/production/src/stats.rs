use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::batch::{Batch, BatchStatus};

/// Tenant-wide batch counters and volume/ABV aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStatistics {
    pub total: usize,
    pub active: usize,
    pub finished: usize,
    pub cancelled: usize,
    pub status_breakdown: BTreeMap<BatchStatus, usize>,
    /// Sum of recorded actual volumes.
    pub total_volume_produced: Decimal,
    pub total_expected_volume: Decimal,
    /// Mean over batches with a computed ABV, two decimals; zero when none.
    pub average_abv: Decimal,
}

impl BatchStatistics {
    pub fn from_batches<'a>(batches: impl IntoIterator<Item = &'a Batch>) -> Self {
        let mut stats = Self {
            total: 0,
            active: 0,
            finished: 0,
            cancelled: 0,
            status_breakdown: BTreeMap::new(),
            total_volume_produced: Decimal::ZERO,
            total_expected_volume: Decimal::ZERO,
            average_abv: Decimal::ZERO,
        };
        let mut abv_sum = Decimal::ZERO;
        let mut abv_count = 0u32;

        for batch in batches {
            stats.total += 1;
            *stats.status_breakdown.entry(batch.status).or_default() += 1;
            match batch.status {
                s if s.is_active() => stats.active += 1,
                BatchStatus::Finished => stats.finished += 1,
                BatchStatus::Cancelled => stats.cancelled += 1,
                _ => {}
            }
            stats.total_expected_volume += batch.expected_volume;
            if let Some(volume) = batch.actual_volume {
                stats.total_volume_produced += volume;
            }
            if let Some(abv) = batch.abv {
                abv_sum += abv;
                abv_count += 1;
            }
        }

        if abv_count > 0 {
            stats.average_abv = (abv_sum / Decimal::from(abv_count))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::PlanBatch;
    use brewhouse_core::{BatchId, RecipeId, TenantId, UserId};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn batch(status: BatchStatus, actual: Option<Decimal>, abv: Option<Decimal>) -> Batch {
        let now = Utc::now();
        let mut b = Batch::plan(
            &PlanBatch {
                tenant_id: TenantId::new(),
                batch_id: BatchId::new(),
                recipe_id: RecipeId::new(),
                location_id: None,
                tank_id: None,
                expected_volume: dec!(20),
                brew_date: now,
                notes: None,
                created_by: UserId::new(),
                occurred_at: now,
            },
            "BR-2025-001",
        )
        .unwrap();
        b.status = status;
        b.actual_volume = actual;
        b.abv = abv;
        b
    }

    #[test]
    fn empty_tenant_has_zero_average() {
        let stats = BatchStatistics::from_batches(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.average_abv, Decimal::ZERO);
        assert!(stats.status_breakdown.is_empty());
    }

    #[test]
    fn buckets_and_aggregates_ignore_nulls() {
        let batches = vec![
            batch(BatchStatus::Planned, None, None),
            batch(BatchStatus::Fermenting, None, Some(dec!(5.64))),
            batch(BatchStatus::Packaging, Some(dec!(18.5)), Some(dec!(4.2))),
            batch(BatchStatus::Finished, Some(dec!(19)), Some(dec!(6.01))),
            batch(BatchStatus::Cancelled, None, None),
        ];
        let stats = BatchStatistics::from_batches(&batches);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.finished, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.status_breakdown[&BatchStatus::Planned], 1);
        assert_eq!(stats.total_volume_produced, dec!(37.5));
        assert_eq!(stats.total_expected_volume, dec!(100));
        assert_eq!(stats.average_abv, dec!(5.28));
    }
}
