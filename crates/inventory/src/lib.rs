//! Inventory domain module: ingredients and the stock movement ledger.
//!
//! Business rules are implemented purely as deterministic domain logic
//! (no IO, no HTTP, no storage). The ledger entries are the events of the
//! `Ingredient` aggregate; the ingredient's `stock` is their projection.

pub mod ingredient;
pub mod movement;
pub mod report;

pub use ingredient::{Ingredient, IngredientType, NewIngredient};
pub use movement::{MovementType, RecordMovement, StockEffect, StockMovement, replay_balance};
pub use report::{
    ConsumptionTrend, DEFAULT_LOW_STOCK_THRESHOLD, InventoryDashboard, InventoryValueLine,
    InventoryValueReport, LowStockAlert, MovementStats, MovementTypeSummary, StockLevel,
    StockStatus, TypeStock,
};
