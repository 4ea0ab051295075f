//! Purchasing domain module (supplier purchase orders).
//!
//! This crate contains business rules for purchase orders, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage). Receipt produces the
//! `IN` movement commands the inventory ledger records.

pub mod order;
pub mod report;

pub use order::{
    CreatePurchaseOrder, GoodsReceived, NewPurchaseOrderItem, PurchaseOrder, PurchaseOrderCommand,
    PurchaseOrderEvent, PurchaseOrderItem, PurchaseOrderPatch, PurchaseOrderStatus,
    PurchaseOrderStatusChanged, PurchaseOrderUpdated, ReceivePurchaseOrder, UpdatePurchaseOrder,
};
pub use report::{PurchaseOrderStats, SupplierRanking, top_suppliers};
