//! Read-only inventory and purchasing reports.
//!
//! Each call loads the tenant's records and projects them; nothing is cached
//! and nothing is written.

use std::sync::Arc;

use chrono::Duration;
use rust_decimal::Decimal;

use brewhouse_core::{Clock, TenantId};
use brewhouse_inventory::{
    ConsumptionTrend, InventoryDashboard, InventoryValueReport, LowStockAlert, MovementTypeSummary, StockLevel,
    TypeStock, report,
};
use brewhouse_purchasing::{SupplierRanking, top_suppliers};

use super::ledger::window_start;
use crate::config::ReportingConfig;
use crate::error::ServiceResult;
use crate::store::{MovementQuery, PurchaseOrderQuery, Store, StoreTx};

pub const DEFAULT_TOP_SUPPLIERS: usize = 5;

pub struct InventoryReports<S: Store> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: ReportingConfig,
}

impl<S: Store> InventoryReports<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, config: ReportingConfig) -> Self {
        Self { store, clock, config }
    }

    pub async fn dashboard(&self, tenant_id: TenantId) -> ServiceResult<InventoryDashboard> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let ingredients = tx.ingredients(tenant_id).await?;
        let recent = MovementQuery {
            since: Some(now - Duration::days(7)),
            ..MovementQuery::default()
        };
        let movements = tx.movements(tenant_id, &recent).await?;
        Ok(report::dashboard(
            &ingredients,
            &movements,
            now,
            self.config.low_stock_threshold,
        ))
    }

    pub async fn stock_levels(&self, tenant_id: TenantId) -> ServiceResult<Vec<StockLevel>> {
        let mut tx = self.store.begin().await?;
        let ingredients = tx.ingredients(tenant_id).await?;
        Ok(report::stock_levels(&ingredients, self.config.low_stock_threshold))
    }

    /// `threshold` overrides the configured default.
    pub async fn low_stock(&self, tenant_id: TenantId, threshold: Option<Decimal>) -> ServiceResult<Vec<LowStockAlert>> {
        let mut tx = self.store.begin().await?;
        let ingredients = tx.ingredients(tenant_id).await?;
        Ok(report::low_stock(
            &ingredients,
            threshold.unwrap_or(self.config.low_stock_threshold),
        ))
    }

    pub async fn stock_by_type(&self, tenant_id: TenantId) -> ServiceResult<Vec<TypeStock>> {
        let mut tx = self.store.begin().await?;
        let ingredients = tx.ingredients(tenant_id).await?;
        Ok(report::stock_by_type(&ingredients))
    }

    pub async fn movement_stats_by_type(
        &self,
        tenant_id: TenantId,
        days: Option<i64>,
    ) -> ServiceResult<Vec<MovementTypeSummary>> {
        let since = window_start(self.clock.now(), days)?;
        let mut tx = self.store.begin().await?;
        let query = MovementQuery {
            since: Some(since),
            ..MovementQuery::default()
        };
        let movements = tx.movements(tenant_id, &query).await?;
        Ok(report::movement_summary_since(&movements, since))
    }

    pub async fn top_suppliers(&self, tenant_id: TenantId, limit: Option<usize>) -> ServiceResult<Vec<SupplierRanking>> {
        let mut tx = self.store.begin().await?;
        let suppliers = tx.suppliers(tenant_id).await?;
        let orders = tx.purchase_orders(tenant_id, &PurchaseOrderQuery::default()).await?;
        Ok(top_suppliers(
            &suppliers,
            &orders,
            limit.unwrap_or(DEFAULT_TOP_SUPPLIERS),
        ))
    }

    pub async fn inventory_value(&self, tenant_id: TenantId) -> ServiceResult<InventoryValueReport> {
        let mut tx = self.store.begin().await?;
        let ingredients = tx.ingredients(tenant_id).await?;
        Ok(report::inventory_value(&ingredients))
    }

    pub async fn consumption_trends(
        &self,
        tenant_id: TenantId,
        days: Option<i64>,
    ) -> ServiceResult<Vec<ConsumptionTrend>> {
        let since = window_start(self.clock.now(), days)?;
        let mut tx = self.store.begin().await?;
        let ingredients = tx.ingredients(tenant_id).await?;
        let query = MovementQuery {
            since: Some(since),
            ..MovementQuery::default()
        };
        let movements = tx.movements(tenant_id, &query).await?;
        Ok(report::consumption_trends(&ingredients, &movements, since))
    }
}
