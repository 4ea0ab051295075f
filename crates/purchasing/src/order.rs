use core::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use brewhouse_core::{
    Aggregate, AggregateRoot, DomainError, Event, IngredientId, LocationId, MovementId,
    PurchaseOrderId, PurchaseOrderItemId, SupplierId, TenantId, TenantScoped, UserId,
};
use brewhouse_inventory::{MovementType, RecordMovement};

/// Purchase order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseOrderStatus {
    Draft,
    Sent,
    Received,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub const ALL: [PurchaseOrderStatus; 4] = [
        PurchaseOrderStatus::Draft,
        PurchaseOrderStatus::Sent,
        PurchaseOrderStatus::Received,
        PurchaseOrderStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "DRAFT",
            PurchaseOrderStatus::Sent => "SENT",
            PurchaseOrderStatus::Received => "RECEIVED",
            PurchaseOrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PurchaseOrderStatus::Received | PurchaseOrderStatus::Cancelled)
    }

    /// Changes allowed through a plain update. RECEIVED is only reachable by receipt.
    pub fn can_update_to(self, next: PurchaseOrderStatus) -> bool {
        matches!(
            (self, next),
            (PurchaseOrderStatus::Draft, PurchaseOrderStatus::Sent)
                | (PurchaseOrderStatus::Draft, PurchaseOrderStatus::Cancelled)
                | (PurchaseOrderStatus::Sent, PurchaseOrderStatus::Cancelled)
        )
    }
}

impl core::fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PurchaseOrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown purchase order status: {s}")))
    }
}

/// Purchase order line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderItem {
    pub id: PurchaseOrderItemId,
    pub ingredient_id: IngredientId,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
    /// `quantity * unit_price`, fixed at creation.
    pub subtotal: Decimal,
    pub notes: Option<String>,
}

/// Line input for a new order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchaseOrderItem {
    pub ingredient_id: IngredientId,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
    pub notes: Option<String>,
}

/// Aggregate root: PurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: PurchaseOrderId,
    pub tenant_id: TenantId,
    pub supplier_id: SupplierId,
    pub po_number: String,
    pub status: PurchaseOrderStatus,
    pub order_date: DateTime<Utc>,
    pub expected_date: Option<DateTime<Utc>>,
    pub received_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub total_amount: Decimal,
    pub items: Vec<PurchaseOrderItem>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

impl AggregateRoot for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl TenantScoped for PurchaseOrder {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Command: CreatePurchaseOrder.
///
/// Supplier and ingredient references are resolved by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchaseOrder {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub items: Vec<NewPurchaseOrderItem>,
    /// Defaults to `occurred_at`.
    pub order_date: Option<DateTime<Utc>>,
    pub expected_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Partial update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderPatch {
    pub supplier_id: Option<SupplierId>,
    pub status: Option<PurchaseOrderStatus>,
    pub order_date: Option<DateTime<Utc>>,
    pub expected_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// Command: UpdatePurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePurchaseOrder {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub patch: PurchaseOrderPatch,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceivePurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivePurchaseOrder {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub received_by: UserId,
    /// Where the goods were put away, if known.
    pub location_id: Option<LocationId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderCommand {
    Update(UpdatePurchaseOrder),
    Receive(ReceivePurchaseOrder),
}

/// Event: PurchaseOrderUpdated (header fields only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderUpdated {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub supplier_id: Option<SupplierId>,
    pub order_date: Option<DateTime<Utc>>,
    pub expected_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderStatusChanged {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub from: PurchaseOrderStatus,
    pub to: PurchaseOrderStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: GoodsReceived.
///
/// Carries every line of the order; the store layer turns it into one `IN`
/// ledger entry per line within the same transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsReceived {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub po_number: String,
    pub received_by: UserId,
    pub location_id: Option<LocationId>,
    pub lines: Vec<PurchaseOrderItem>,
    pub occurred_at: DateTime<Utc>,
}

impl GoodsReceived {
    /// One `IN` movement per received line, ordered by ingredient.
    ///
    /// Posting in ingredient order makes every receipt take its ingredient row
    /// locks in the same sequence.
    pub fn stock_receipts(&self) -> Vec<RecordMovement> {
        let mut receipts: Vec<RecordMovement> = self
            .lines
            .iter()
            .map(|line| RecordMovement {
                tenant_id: self.tenant_id,
                movement_id: MovementId::new(),
                ingredient_id: line.ingredient_id,
                movement_type: MovementType::In,
                quantity: line.quantity,
                unit: Some(line.unit.clone()),
                location_id: self.location_id,
                batch_id: None,
                reason: Some(format!("Purchase Order: {}", self.po_number)),
                reference: Some(self.po_number.clone()),
                moved_by: self.received_by,
                moved_at: self.occurred_at,
            })
            .collect();
        receipts.sort_by_key(|r| r.ingredient_id);
        receipts
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderEvent {
    Updated(PurchaseOrderUpdated),
    StatusChanged(PurchaseOrderStatusChanged),
    GoodsReceived(GoodsReceived),
}

impl Event for PurchaseOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseOrderEvent::Updated(_) => "purchasing.order.updated",
            PurchaseOrderEvent::StatusChanged(_) => "purchasing.order.status_changed",
            PurchaseOrderEvent::GoodsReceived(_) => "purchasing.order.goods_received",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseOrderEvent::Updated(e) => e.occurred_at,
            PurchaseOrderEvent::StatusChanged(e) => e.occurred_at,
            PurchaseOrderEvent::GoodsReceived(e) => e.occurred_at,
        }
    }
}

impl PurchaseOrder {
    /// A new order in `DRAFT` with per-line subtotals and the order total.
    pub fn draft(cmd: &CreatePurchaseOrder, po_number: impl Into<String>) -> Result<Self, DomainError> {
        if cmd.items.is_empty() {
            return Err(DomainError::validation("purchase order needs at least one item"));
        }

        let mut items = Vec::with_capacity(cmd.items.len());
        for item in &cmd.items {
            if item.quantity <= Decimal::ZERO {
                return Err(DomainError::validation("quantity must be positive"));
            }
            if item.unit_price < Decimal::ZERO {
                return Err(DomainError::validation("unit price cannot be negative"));
            }
            items.push(PurchaseOrderItem {
                id: PurchaseOrderItemId::new(),
                ingredient_id: item.ingredient_id,
                quantity: item.quantity,
                unit: item.unit.clone(),
                unit_price: item.unit_price,
                subtotal: item.quantity * item.unit_price,
                notes: item.notes.clone(),
            });
        }
        let total_amount = items.iter().map(|i| i.subtotal).sum();

        Ok(Self {
            id: cmd.order_id,
            tenant_id: cmd.tenant_id,
            supplier_id: cmd.supplier_id,
            po_number: po_number.into(),
            status: PurchaseOrderStatus::Draft,
            order_date: cmd.order_date.unwrap_or(cmd.occurred_at),
            expected_date: cmd.expected_date,
            received_date: None,
            notes: cmd.notes.clone(),
            total_amount,
            items,
            created_by: cmd.created_by,
            created_at: cmd.occurred_at,
            version: 0,
        })
    }

    pub fn ensure_removable(&self) -> Result<(), DomainError> {
        if self.status != PurchaseOrderStatus::Draft {
            return Err(DomainError::conflict("can only delete DRAFT orders"));
        }
        Ok(())
    }

    fn ensure_target(&self, tenant_id: TenantId, order_id: PurchaseOrderId) -> Result<(), DomainError> {
        if self.tenant_id != tenant_id || self.id != order_id {
            return Err(DomainError::not_found("Purchase order"));
        }
        Ok(())
    }

    fn handle_update(&self, cmd: &UpdatePurchaseOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.order_id)?;

        if self.status.is_terminal() {
            return Err(DomainError::conflict(format!(
                "cannot update {} purchase order",
                self.status
            )));
        }

        let patch = &cmd.patch;
        let mut events = Vec::new();

        let header_changed = patch.supplier_id.is_some()
            || patch.order_date.is_some()
            || patch.expected_date.is_some()
            || patch.notes.is_some();
        if header_changed {
            events.push(PurchaseOrderEvent::Updated(PurchaseOrderUpdated {
                tenant_id: cmd.tenant_id,
                order_id: cmd.order_id,
                supplier_id: patch.supplier_id,
                order_date: patch.order_date,
                expected_date: patch.expected_date,
                notes: patch.notes.clone(),
                occurred_at: cmd.occurred_at,
            }));
        }

        // Re-sending the current status is a no-op.
        if let Some(to) = patch.status.filter(|to| *to != self.status) {
            if !self.status.can_update_to(to) {
                return Err(DomainError::invalid_transition(self.status, to));
            }
            events.push(PurchaseOrderEvent::StatusChanged(PurchaseOrderStatusChanged {
                tenant_id: cmd.tenant_id,
                order_id: cmd.order_id,
                from: self.status,
                to,
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_receive(&self, cmd: &ReceivePurchaseOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.order_id)?;

        match self.status {
            PurchaseOrderStatus::Received => {
                return Err(DomainError::conflict("purchase order already received"));
            }
            PurchaseOrderStatus::Cancelled => {
                return Err(DomainError::conflict("cannot receive cancelled order"));
            }
            PurchaseOrderStatus::Draft | PurchaseOrderStatus::Sent => {}
        }

        Ok(vec![PurchaseOrderEvent::GoodsReceived(GoodsReceived {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            po_number: self.po_number.clone(),
            received_by: cmd.received_by,
            location_id: cmd.location_id,
            lines: self.items.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

impl Aggregate for PurchaseOrder {
    type Command = PurchaseOrderCommand;
    type Event = PurchaseOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseOrderEvent::Updated(e) => {
                if let Some(supplier_id) = e.supplier_id {
                    self.supplier_id = supplier_id;
                }
                if let Some(order_date) = e.order_date {
                    self.order_date = order_date;
                }
                if let Some(expected_date) = e.expected_date {
                    self.expected_date = Some(expected_date);
                }
                if let Some(notes) = &e.notes {
                    self.notes = Some(notes.clone());
                }
            }
            PurchaseOrderEvent::StatusChanged(e) => {
                self.status = e.to;
            }
            PurchaseOrderEvent::GoodsReceived(e) => {
                self.status = PurchaseOrderStatus::Received;
                self.received_date = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseOrderCommand::Update(cmd) => self.handle_update(cmd),
            PurchaseOrderCommand::Receive(cmd) => self.handle_receive(cmd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn draft_order() -> PurchaseOrder {
        let cmd = CreatePurchaseOrder {
            tenant_id: TenantId::new(),
            order_id: PurchaseOrderId::new(),
            supplier_id: SupplierId::new(),
            items: vec![
                NewPurchaseOrderItem {
                    ingredient_id: IngredientId::new(),
                    quantity: dec!(25),
                    unit: "kg".to_string(),
                    unit_price: dec!(1.20),
                    notes: None,
                },
                NewPurchaseOrderItem {
                    ingredient_id: IngredientId::new(),
                    quantity: dec!(2.5),
                    unit: "kg".to_string(),
                    unit_price: dec!(38),
                    notes: Some("pellets".to_string()),
                },
            ],
            order_date: None,
            expected_date: None,
            notes: None,
            created_by: UserId::new(),
            occurred_at: test_time(),
        };
        PurchaseOrder::draft(&cmd, "PO-2025-0001").unwrap()
    }

    fn status_update(order: &PurchaseOrder, status: PurchaseOrderStatus) -> PurchaseOrderCommand {
        PurchaseOrderCommand::Update(UpdatePurchaseOrder {
            tenant_id: order.tenant_id,
            order_id: order.id,
            patch: PurchaseOrderPatch {
                status: Some(status),
                ..PurchaseOrderPatch::default()
            },
            occurred_at: test_time(),
        })
    }

    fn receive(order: &PurchaseOrder) -> PurchaseOrderCommand {
        PurchaseOrderCommand::Receive(ReceivePurchaseOrder {
            tenant_id: order.tenant_id,
            order_id: order.id,
            received_by: UserId::new(),
            location_id: None,
            occurred_at: test_time(),
        })
    }

    #[test]
    fn draft_computes_subtotals_and_total() {
        let order = draft_order();
        assert_eq!(order.status, PurchaseOrderStatus::Draft);
        assert_eq!(order.items[0].subtotal, dec!(30.00));
        assert_eq!(order.items[1].subtotal, dec!(95.0));
        assert_eq!(order.total_amount, dec!(125));
        assert_eq!(order.order_date, order.created_at);
    }

    #[test]
    fn draft_rejects_empty_or_non_positive_items() {
        let mut cmd = CreatePurchaseOrder {
            tenant_id: TenantId::new(),
            order_id: PurchaseOrderId::new(),
            supplier_id: SupplierId::new(),
            items: vec![],
            order_date: None,
            expected_date: None,
            notes: None,
            created_by: UserId::new(),
            occurred_at: test_time(),
        };
        assert!(matches!(PurchaseOrder::draft(&cmd, "PO-2025-0001"), Err(DomainError::Validation(_))));

        cmd.items.push(NewPurchaseOrderItem {
            ingredient_id: IngredientId::new(),
            quantity: dec!(0),
            unit: "kg".to_string(),
            unit_price: dec!(1),
            notes: None,
        });
        assert!(matches!(PurchaseOrder::draft(&cmd, "PO-2025-0001"), Err(DomainError::Validation(_))));
    }

    #[test]
    fn send_then_cancel() {
        let mut order = draft_order();
        order.execute(&status_update(&order, PurchaseOrderStatus::Sent)).unwrap();
        assert_eq!(order.status, PurchaseOrderStatus::Sent);
        order.execute(&status_update(&order, PurchaseOrderStatus::Cancelled)).unwrap();
        assert_eq!(order.status, PurchaseOrderStatus::Cancelled);
        assert_eq!(order.version, 2);
    }

    #[test]
    fn received_is_not_reachable_by_update() {
        let order = draft_order();
        let err = order.handle(&status_update(&order, PurchaseOrderStatus::Received)).unwrap_err();
        assert_eq!(err, DomainError::invalid_transition("DRAFT", "RECEIVED"));
    }

    #[test]
    fn sent_cannot_go_back_to_draft() {
        let mut order = draft_order();
        order.execute(&status_update(&order, PurchaseOrderStatus::Sent)).unwrap();
        let err = order.handle(&status_update(&order, PurchaseOrderStatus::Draft)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }

    #[test]
    fn terminal_orders_reject_updates() {
        let mut order = draft_order();
        order.execute(&receive(&order)).unwrap();
        let cmd = PurchaseOrderCommand::Update(UpdatePurchaseOrder {
            tenant_id: order.tenant_id,
            order_id: order.id,
            patch: PurchaseOrderPatch {
                notes: Some("late".to_string()),
                ..PurchaseOrderPatch::default()
            },
            occurred_at: test_time(),
        });
        assert!(matches!(order.handle(&cmd), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn header_update_applies_only_given_fields() {
        let mut order = draft_order();
        let supplier_id = SupplierId::new();
        let expected = test_time();
        order
            .execute(&PurchaseOrderCommand::Update(UpdatePurchaseOrder {
                tenant_id: order.tenant_id,
                order_id: order.id,
                patch: PurchaseOrderPatch {
                    supplier_id: Some(supplier_id),
                    expected_date: Some(expected),
                    ..PurchaseOrderPatch::default()
                },
                occurred_at: test_time(),
            }))
            .unwrap();
        assert_eq!(order.supplier_id, supplier_id);
        assert_eq!(order.expected_date, Some(expected));
        assert_eq!(order.notes, None);
        assert_eq!(order.status, PurchaseOrderStatus::Draft);
    }

    #[test]
    fn receive_emits_goods_received_with_every_line() {
        let mut order = draft_order();
        let events = order.execute(&receive(&order)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(order.status, PurchaseOrderStatus::Received);
        assert!(order.received_date.is_some());

        let PurchaseOrderEvent::GoodsReceived(received) = &events[0] else {
            panic!("Expected GoodsReceived event");
        };
        let receipts = received.stock_receipts();
        assert_eq!(receipts.len(), 2);
        for line in &order.items {
            let receipt = receipts.iter().find(|r| r.ingredient_id == line.ingredient_id).unwrap();
            assert_eq!(receipt.movement_type, MovementType::In);
            assert_eq!(receipt.quantity, line.quantity);
            assert_eq!(receipt.reference.as_deref(), Some("PO-2025-0001"));
            assert_eq!(receipt.reason.as_deref(), Some("Purchase Order: PO-2025-0001"));
        }
    }

    #[test]
    fn receipts_are_posted_in_ingredient_order() {
        let mut order = draft_order();
        order.items.reverse();
        let mut reversed = order.clone();
        reversed.items.reverse();

        fn receipts_of(order: &mut PurchaseOrder) -> Vec<IngredientId> {
            let cmd = receive(order);
            let events = order.execute(&cmd).unwrap();
            let PurchaseOrderEvent::GoodsReceived(received) = &events[0] else {
                panic!("Expected GoodsReceived event");
            };
            received.stock_receipts().iter().map(|r| r.ingredient_id).collect()
        }
        let forward = receipts_of(&mut order);
        let backward = receipts_of(&mut reversed);

        assert_eq!(forward, backward);
        assert!(forward.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn cannot_receive_twice() {
        let mut order = draft_order();
        order.execute(&receive(&order)).unwrap();
        let err = order.handle(&receive(&order)).unwrap_err();
        assert_eq!(err, DomainError::conflict("purchase order already received"));
    }

    #[test]
    fn cannot_receive_cancelled_order() {
        let mut order = draft_order();
        order.execute(&status_update(&order, PurchaseOrderStatus::Cancelled)).unwrap();
        let err = order.handle(&receive(&order)).unwrap_err();
        assert_eq!(err, DomainError::conflict("cannot receive cancelled order"));
    }

    #[test]
    fn only_drafts_are_removable() {
        let mut order = draft_order();
        assert!(order.ensure_removable().is_ok());
        order.execute(&status_update(&order, PurchaseOrderStatus::Sent)).unwrap();
        assert_eq!(
            order.ensure_removable().unwrap_err(),
            DomainError::conflict("can only delete DRAFT orders")
        );
    }

    #[test]
    fn foreign_tenant_is_not_found() {
        let order = draft_order();
        let cmd = PurchaseOrderCommand::Receive(ReceivePurchaseOrder {
            tenant_id: TenantId::new(),
            order_id: order.id,
            received_by: UserId::new(),
            location_id: None,
            occurred_at: test_time(),
        });
        assert_eq!(order.handle(&cmd).unwrap_err(), DomainError::not_found("Purchase order"));
    }

    proptest! {
        /// Property: the order total is the sum of line subtotals.
        #[test]
        fn total_is_sum_of_subtotals(
            lines in prop::collection::vec((1i64..10_000, 0i64..100_000), 1..8),
        ) {
            let items: Vec<NewPurchaseOrderItem> = lines
                .iter()
                .map(|(qty, price)| NewPurchaseOrderItem {
                    ingredient_id: IngredientId::new(),
                    quantity: Decimal::new(*qty, 1),
                    unit: "kg".to_string(),
                    unit_price: Decimal::new(*price, 2),
                    notes: None,
                })
                .collect();
            let cmd = CreatePurchaseOrder {
                tenant_id: TenantId::new(),
                order_id: PurchaseOrderId::new(),
                supplier_id: SupplierId::new(),
                items,
                order_date: None,
                expected_date: None,
                notes: None,
                created_by: UserId::new(),
                occurred_at: test_time(),
            };
            let order = PurchaseOrder::draft(&cmd, "PO-2025-0001").unwrap();
            let expected: Decimal = lines
                .iter()
                .map(|(qty, price)| Decimal::new(*qty, 1) * Decimal::new(*price, 2))
                .sum();
            prop_assert_eq!(order.total_amount, expected);
            prop_assert!(order.items.iter().all(|i| i.subtotal == i.quantity * i.unit_price));
        }
    }
}
