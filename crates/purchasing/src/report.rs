use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use brewhouse_core::{Supplier, SupplierId};

use crate::order::{PurchaseOrder, PurchaseOrderStatus};

/// Order counts per status and the value of everything not cancelled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderStats {
    pub total: usize,
    pub draft: usize,
    pub sent: usize,
    pub received: usize,
    pub cancelled: usize,
    pub total_value: Decimal,
}

impl PurchaseOrderStats {
    pub fn from_orders<'a>(orders: impl IntoIterator<Item = &'a PurchaseOrder>) -> Self {
        let mut stats = Self::default();
        for order in orders {
            stats.total += 1;
            match order.status {
                PurchaseOrderStatus::Draft => stats.draft += 1,
                PurchaseOrderStatus::Sent => stats.sent += 1,
                PurchaseOrderStatus::Received => stats.received += 1,
                PurchaseOrderStatus::Cancelled => stats.cancelled += 1,
            }
            if order.status != PurchaseOrderStatus::Cancelled {
                stats.total_value += order.total_amount;
            }
        }
        stats
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierRanking {
    pub supplier_id: SupplierId,
    pub name: String,
    pub order_count: usize,
    pub total_value: Decimal,
}

/// Active suppliers ranked by number of purchase orders, at most `limit`.
///
/// Suppliers without orders are included with a zero count.
pub fn top_suppliers(suppliers: &[Supplier], orders: &[PurchaseOrder], limit: usize) -> Vec<SupplierRanking> {
    let mut per_supplier: HashMap<SupplierId, (usize, Decimal)> = HashMap::new();
    for order in orders {
        let entry = per_supplier.entry(order.supplier_id).or_default();
        entry.0 += 1;
        entry.1 += order.total_amount;
    }

    let mut ranking: Vec<SupplierRanking> = suppliers
        .iter()
        .filter(|s| s.is_active)
        .map(|s| {
            let (order_count, total_value) = per_supplier.get(&s.id).copied().unwrap_or_default();
            SupplierRanking {
                supplier_id: s.id,
                name: s.name.clone(),
                order_count,
                total_value,
            }
        })
        .collect();
    ranking.sort_by(|a, b| {
        b.order_count
            .cmp(&a.order_count)
            .then_with(|| b.total_value.cmp(&a.total_value))
            .then_with(|| a.name.cmp(&b.name))
    });
    ranking.truncate(limit);
    ranking
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{CreatePurchaseOrder, NewPurchaseOrderItem};
    use brewhouse_core::{IngredientId, PurchaseOrderId, TenantId, UserId};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn supplier(tenant_id: TenantId, name: &str, active: bool) -> Supplier {
        Supplier {
            id: SupplierId::new(),
            tenant_id,
            name: name.to_string(),
            is_active: active,
        }
    }

    fn order(tenant_id: TenantId, supplier_id: SupplierId, price: Decimal, status: PurchaseOrderStatus) -> PurchaseOrder {
        let mut po = PurchaseOrder::draft(
            &CreatePurchaseOrder {
                tenant_id,
                order_id: PurchaseOrderId::new(),
                supplier_id,
                items: vec![NewPurchaseOrderItem {
                    ingredient_id: IngredientId::new(),
                    quantity: dec!(1),
                    unit: "kg".to_string(),
                    unit_price: price,
                    notes: None,
                }],
                order_date: None,
                expected_date: None,
                notes: None,
                created_by: UserId::new(),
                occurred_at: Utc::now(),
            },
            "PO-2025-0001",
        )
        .unwrap();
        po.status = status;
        po
    }

    #[test]
    fn stats_exclude_cancelled_value() {
        let tenant = TenantId::new();
        let s = SupplierId::new();
        let orders = vec![
            order(tenant, s, dec!(100), PurchaseOrderStatus::Draft),
            order(tenant, s, dec!(50), PurchaseOrderStatus::Sent),
            order(tenant, s, dec!(25), PurchaseOrderStatus::Received),
            order(tenant, s, dec!(999), PurchaseOrderStatus::Cancelled),
        ];
        let stats = PurchaseOrderStats::from_orders(&orders);
        assert_eq!(stats.total, 4);
        assert_eq!((stats.draft, stats.sent, stats.received, stats.cancelled), (1, 1, 1, 1));
        assert_eq!(stats.total_value, dec!(175));
    }

    #[test]
    fn top_suppliers_ranks_active_by_order_count() {
        let tenant = TenantId::new();
        let maltings = supplier(tenant, "Maltings", true);
        let hops = supplier(tenant, "Hop Farm", true);
        let idle = supplier(tenant, "Idle Co", true);
        let gone = supplier(tenant, "Gone Ltd", false);
        let orders = vec![
            order(tenant, hops.id, dec!(10), PurchaseOrderStatus::Draft),
            order(tenant, hops.id, dec!(15), PurchaseOrderStatus::Sent),
            order(tenant, maltings.id, dec!(300), PurchaseOrderStatus::Received),
            order(tenant, gone.id, dec!(1), PurchaseOrderStatus::Draft),
            order(tenant, gone.id, dec!(1), PurchaseOrderStatus::Draft),
            order(tenant, gone.id, dec!(1), PurchaseOrderStatus::Draft),
        ];

        let ranking = top_suppliers(&[maltings, hops, idle, gone], &orders, 5);
        let names: Vec<&str> = ranking.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Hop Farm", "Maltings", "Idle Co"]);
        assert_eq!(ranking[0].total_value, dec!(25));
        assert_eq!(ranking[2].order_count, 0);

        assert_eq!(top_suppliers(&[], &orders, 5), vec![]);
    }
}
