//! Application services.
//!
//! Each mutating operation opens one store transaction, resolves and
//! tenant-checks every reference, lets the aggregate decide, writes the
//! outcome and commits. Any error before `commit` drops the transaction,
//! which rolls it back.

pub mod batches;
pub mod catalog;
pub mod ledger;
pub mod purchasing;
pub mod reports;

pub use batches::{BatchService, NewBatch};
pub use catalog::CatalogService;
pub use ledger::{InventoryLedger, MovementFilter, MovementRecord, NewMovement};
pub use purchasing::{NewPurchaseOrder, PurchaseOrderReceipt, PurchaseOrderService};
pub use reports::InventoryReports;

use std::sync::Arc;

use tracing::warn;

use brewhouse_core::Clock;

use crate::config::ReportingConfig;
use crate::error::ServiceError;
use crate::store::Store;

/// Domain rejections are expected traffic; log them at `warn`.
pub(crate) fn log_rejection(operation: &'static str, err: &ServiceError) {
    if let ServiceError::Domain(e) = err {
        warn!(operation, code = e.code(), error = %e, "request rejected");
    }
}

/// Every service wired to one store and clock.
pub struct Services<S: Store> {
    pub catalog: CatalogService<S>,
    pub ledger: InventoryLedger<S>,
    pub batches: BatchService<S>,
    pub purchasing: PurchaseOrderService<S>,
    pub reports: InventoryReports<S>,
}

impl<S: Store> Services<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, reporting: ReportingConfig) -> Self {
        Self {
            catalog: CatalogService::new(store.clone(), clock.clone()),
            ledger: InventoryLedger::new(store.clone(), clock.clone()),
            batches: BatchService::new(store.clone(), clock.clone()),
            purchasing: PurchaseOrderService::new(store.clone(), clock.clone()),
            reports: InventoryReports::new(store, clock, reporting),
        }
    }
}
