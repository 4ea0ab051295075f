//! Purchase order service, including goods receipt.
//!
//! Receipt is all-or-nothing: the status change, every `IN` ledger entry and
//! every stock increment share one transaction. If any line's ingredient has
//! disappeared the transaction is dropped and nothing is written.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use brewhouse_core::{
    Aggregate, Clock, DocumentKind, DomainError, IngredientId, LocationId, PurchaseOrderId, SupplierId,
    TenantId, UserId, scoped,
};
use brewhouse_inventory::StockMovement;
use brewhouse_purchasing::{
    CreatePurchaseOrder, NewPurchaseOrderItem, PurchaseOrder, PurchaseOrderCommand, PurchaseOrderEvent,
    PurchaseOrderPatch, PurchaseOrderStats, ReceivePurchaseOrder, UpdatePurchaseOrder,
};

use super::ledger::post_movement;
use super::log_rejection;
use crate::error::{ServiceError, ServiceResult};
use crate::sequencer::next_number;
use crate::store::{PurchaseOrderQuery, Store, StoreTx};

/// Input for a new purchase order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchaseOrder {
    pub supplier_id: SupplierId,
    pub items: Vec<NewPurchaseOrderItem>,
    pub order_date: Option<DateTime<Utc>>,
    pub expected_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// Outcome of a receipt: the received order and the ledger entries it posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderReceipt {
    pub order: PurchaseOrder,
    pub movements: Vec<StockMovement>,
}

pub struct PurchaseOrderService<S: Store> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: Store> PurchaseOrderService<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, supplier_id = %input.supplier_id), err)]
    pub async fn create_purchase_order(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        input: NewPurchaseOrder,
    ) -> ServiceResult<PurchaseOrder> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        scoped(tenant_id, tx.supplier(tenant_id, input.supplier_id).await?, "Supplier")?;

        let distinct: Vec<IngredientId> = input
            .items
            .iter()
            .map(|item| item.ingredient_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let found = tx.ingredients_by_ids(tenant_id, &distinct).await?;
        if found.len() != distinct.len() {
            return Err(DomainError::bad_request("one or more ingredients not found").into());
        }

        let cmd = CreatePurchaseOrder {
            tenant_id,
            order_id: PurchaseOrderId::new(),
            supplier_id: input.supplier_id,
            items: input.items,
            order_date: input.order_date,
            expected_date: input.expected_date,
            notes: input.notes,
            created_by: user_id,
            occurred_at: now,
        };
        let number = next_number(&mut tx, tenant_id, DocumentKind::PurchaseOrder, now.year()).await?;
        let order = PurchaseOrder::draft(&cmd, number.to_string())?;
        tx.insert_purchase_order(&order).await?;
        tx.commit().await?;

        info!(
            order_id = %order.id,
            po_number = %order.po_number,
            total_amount = %order.total_amount,
            "purchase order drafted"
        );
        Ok(order)
    }

    /// Header changes and the status moves allowed outside of receipt.
    #[instrument(skip(self, patch), fields(tenant_id = %tenant_id, order_id = %order_id), err)]
    pub async fn update_purchase_order(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
        patch: PurchaseOrderPatch,
    ) -> ServiceResult<PurchaseOrder> {
        let mut tx = self.store.begin().await?;
        let mut order = scoped(tenant_id, tx.lock_purchase_order(tenant_id, order_id).await?, "Purchase order")?;

        if let Some(supplier_id) = patch.supplier_id {
            scoped(tenant_id, tx.supplier(tenant_id, supplier_id).await?, "Supplier")?;
        }

        let cmd = PurchaseOrderCommand::Update(UpdatePurchaseOrder {
            tenant_id,
            order_id,
            patch,
            occurred_at: self.clock.now(),
        });
        let events = order
            .execute(&cmd)
            .map_err(ServiceError::from)
            .inspect_err(|e| log_rejection("update_purchase_order", e))?;
        tx.save_purchase_order(&order).await?;
        tx.commit().await?;

        for event in &events {
            if let PurchaseOrderEvent::StatusChanged(changed) = event {
                info!(from = %changed.from, to = %changed.to, "purchase order status changed");
            }
        }
        Ok(order)
    }

    /// Mark the order received and post one `IN` movement per line.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, order_id = %order_id), err)]
    pub async fn receive(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        order_id: PurchaseOrderId,
        location_id: Option<LocationId>,
    ) -> ServiceResult<PurchaseOrderReceipt> {
        let mut tx = self.store.begin().await?;
        let mut order = scoped(tenant_id, tx.lock_purchase_order(tenant_id, order_id).await?, "Purchase order")?;

        if let Some(id) = location_id {
            scoped(tenant_id, tx.location(tenant_id, id).await?, "Location")?;
        }

        let cmd = PurchaseOrderCommand::Receive(ReceivePurchaseOrder {
            tenant_id,
            order_id,
            received_by: user_id,
            location_id,
            occurred_at: self.clock.now(),
        });
        let events = order
            .execute(&cmd)
            .map_err(ServiceError::from)
            .inspect_err(|e| log_rejection("receive_purchase_order", e))?;

        let mut movements = Vec::new();
        for event in &events {
            let PurchaseOrderEvent::GoodsReceived(received) = event else {
                continue;
            };
            for receipt in received.stock_receipts() {
                let (_, movement) = post_movement(&mut tx, &receipt)
                    .await
                    .inspect_err(|e| log_rejection("receive_purchase_order", e))?;
                movements.push(movement);
            }
        }
        tx.save_purchase_order(&order).await?;
        tx.commit().await?;

        info!(po_number = %order.po_number, lines = movements.len(), "purchase order received");
        Ok(PurchaseOrderReceipt { order, movements })
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, order_id = %order_id), err)]
    pub async fn remove_purchase_order(&self, tenant_id: TenantId, order_id: PurchaseOrderId) -> ServiceResult<()> {
        let mut tx = self.store.begin().await?;
        let order = scoped(tenant_id, tx.lock_purchase_order(tenant_id, order_id).await?, "Purchase order")?;
        order
            .ensure_removable()
            .map_err(ServiceError::from)
            .inspect_err(|e| log_rejection("remove_purchase_order", e))?;
        tx.delete_purchase_order(tenant_id, order_id).await?;
        tx.commit().await?;

        info!(po_number = %order.po_number, "purchase order removed");
        Ok(())
    }

    pub async fn get_purchase_order(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
    ) -> ServiceResult<PurchaseOrder> {
        let mut tx = self.store.begin().await?;
        Ok(scoped(tenant_id, tx.purchase_order(tenant_id, order_id).await?, "Purchase order")?)
    }

    /// Newest first.
    pub async fn list_purchase_orders(
        &self,
        tenant_id: TenantId,
        filter: PurchaseOrderQuery,
    ) -> ServiceResult<Vec<PurchaseOrder>> {
        let mut tx = self.store.begin().await?;
        let filter = PurchaseOrderQuery {
            search: filter.search.filter(|s| !s.trim().is_empty()),
            ..filter
        };
        Ok(tx.purchase_orders(tenant_id, &filter).await?)
    }

    pub async fn stats(&self, tenant_id: TenantId) -> ServiceResult<PurchaseOrderStats> {
        let mut tx = self.store.begin().await?;
        let orders = tx.purchase_orders(tenant_id, &PurchaseOrderQuery::default()).await?;
        Ok(PurchaseOrderStats::from_orders(&orders))
    }
}
