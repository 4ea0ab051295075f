//! `brewhouse-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the brewery
//! bounded contexts (no infrastructure concerns).

pub mod aggregate;
pub mod catalog;
pub mod clock;
pub mod error;
pub mod event;
pub mod id;
pub mod numbering;
pub mod tenant;

pub use aggregate::{Aggregate, AggregateRoot};
pub use catalog::{Location, Recipe, Supplier, Tank};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{DomainError, DomainResult};
pub use event::Event;
pub use id::{
    BatchId, IngredientId, LocationId, MovementId, PurchaseOrderId, PurchaseOrderItemId, RecipeId,
    StatusHistoryId, SupplierId, TankId, TenantId, UserId,
};
pub use numbering::{DocumentKind, DocumentNumber};
pub use tenant::{TenantScoped, scoped};
