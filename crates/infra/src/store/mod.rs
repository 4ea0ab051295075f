//! Transactional record store.
//!
//! Every mutating service operation runs inside one `StoreTx`: reads, the
//! domain decision and all writes either commit together or not at all.
//! Dropping a transaction without calling `commit` rolls it back.
//!
//! Every lookup takes the tenant explicitly and only ever returns records of
//! that tenant.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::{PostgresStore, PostgresTx};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use brewhouse_core::{
    BatchId, DocumentKind, IngredientId, Location, LocationId, MovementId, PurchaseOrderId, Recipe,
    RecipeId, Supplier, SupplierId, Tank, TankId, TenantId,
};
use brewhouse_inventory::{Ingredient, MovementType, StockMovement};
use brewhouse_production::{Batch, BatchStatus, BatchStatusHistory};
use brewhouse_purchasing::{PurchaseOrder, PurchaseOrderStatus};

use crate::error::StoreError;

/// Ledger filter. Results are newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovementQuery {
    pub ingredient_id: Option<IngredientId>,
    pub movement_type: Option<MovementType>,
    pub batch_id: Option<BatchId>,
    pub since: Option<DateTime<Utc>>,
    /// Case-insensitive match on ingredient name, reference or reason.
    pub search: Option<String>,
    pub limit: Option<usize>,
}

/// Purchase order filter. Results are newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurchaseOrderQuery {
    pub status: Option<PurchaseOrderStatus>,
    /// Case-insensitive match on PO number or supplier name.
    pub search: Option<String>,
}

/// Opens transactions.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Tx: StoreTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}

/// One unit of work against the store.
#[async_trait]
pub trait StoreTx: Send {
    // Reference records.
    async fn recipe(&mut self, tenant_id: TenantId, id: RecipeId) -> Result<Option<Recipe>, StoreError>;
    async fn location(&mut self, tenant_id: TenantId, id: LocationId) -> Result<Option<Location>, StoreError>;
    async fn tank(&mut self, tenant_id: TenantId, id: TankId) -> Result<Option<Tank>, StoreError>;
    async fn supplier(&mut self, tenant_id: TenantId, id: SupplierId) -> Result<Option<Supplier>, StoreError>;
    async fn suppliers(&mut self, tenant_id: TenantId) -> Result<Vec<Supplier>, StoreError>;
    async fn insert_recipe(&mut self, recipe: &Recipe) -> Result<(), StoreError>;
    async fn insert_location(&mut self, location: &Location) -> Result<(), StoreError>;
    async fn insert_tank(&mut self, tank: &Tank) -> Result<(), StoreError>;
    async fn insert_supplier(&mut self, supplier: &Supplier) -> Result<(), StoreError>;

    // Ingredients.
    async fn ingredient(&mut self, tenant_id: TenantId, id: IngredientId) -> Result<Option<Ingredient>, StoreError>;
    /// Reads the ingredient and holds its row lock until the transaction ends.
    async fn lock_ingredient(
        &mut self,
        tenant_id: TenantId,
        id: IngredientId,
    ) -> Result<Option<Ingredient>, StoreError>;
    async fn ingredients(&mut self, tenant_id: TenantId) -> Result<Vec<Ingredient>, StoreError>;
    async fn ingredients_by_ids(
        &mut self,
        tenant_id: TenantId,
        ids: &[IngredientId],
    ) -> Result<Vec<Ingredient>, StoreError>;
    async fn insert_ingredient(&mut self, ingredient: &Ingredient) -> Result<(), StoreError>;
    /// Persists the projected balance, active flag and version.
    async fn save_ingredient(&mut self, ingredient: &Ingredient) -> Result<(), StoreError>;
    async fn delete_ingredient(&mut self, tenant_id: TenantId, id: IngredientId) -> Result<(), StoreError>;

    // Ledger.
    async fn insert_movement(&mut self, movement: &StockMovement) -> Result<(), StoreError>;
    async fn movement(&mut self, tenant_id: TenantId, id: MovementId) -> Result<Option<StockMovement>, StoreError>;
    /// Newest recorded first, regardless of `moved_at`.
    async fn movements(&mut self, tenant_id: TenantId, query: &MovementQuery) -> Result<Vec<StockMovement>, StoreError>;

    // Batches.
    async fn batch(&mut self, tenant_id: TenantId, id: BatchId) -> Result<Option<Batch>, StoreError>;
    async fn lock_batch(&mut self, tenant_id: TenantId, id: BatchId) -> Result<Option<Batch>, StoreError>;
    /// Newest first.
    async fn batches(&mut self, tenant_id: TenantId, status: Option<BatchStatus>) -> Result<Vec<Batch>, StoreError>;
    async fn insert_batch(&mut self, batch: &Batch) -> Result<(), StoreError>;
    async fn save_batch(&mut self, batch: &Batch) -> Result<(), StoreError>;
    async fn delete_batch(&mut self, tenant_id: TenantId, id: BatchId) -> Result<(), StoreError>;
    async fn insert_status_history(&mut self, entry: &BatchStatusHistory) -> Result<(), StoreError>;
    /// Chronological.
    async fn status_history(
        &mut self,
        tenant_id: TenantId,
        batch_id: BatchId,
    ) -> Result<Vec<BatchStatusHistory>, StoreError>;

    // Purchase orders.
    async fn purchase_order(
        &mut self,
        tenant_id: TenantId,
        id: PurchaseOrderId,
    ) -> Result<Option<PurchaseOrder>, StoreError>;
    async fn lock_purchase_order(
        &mut self,
        tenant_id: TenantId,
        id: PurchaseOrderId,
    ) -> Result<Option<PurchaseOrder>, StoreError>;
    async fn purchase_orders(
        &mut self,
        tenant_id: TenantId,
        query: &PurchaseOrderQuery,
    ) -> Result<Vec<PurchaseOrder>, StoreError>;
    /// Inserts the header and every line.
    async fn insert_purchase_order(&mut self, order: &PurchaseOrder) -> Result<(), StoreError>;
    /// Updates header fields only; lines never change after creation.
    async fn save_purchase_order(&mut self, order: &PurchaseOrder) -> Result<(), StoreError>;
    async fn delete_purchase_order(&mut self, tenant_id: TenantId, id: PurchaseOrderId) -> Result<(), StoreError>;

    // Numbering.
    /// Serializes number allocation for `(tenant, kind, year)` until the transaction ends.
    async fn lock_sequence(&mut self, tenant_id: TenantId, kind: DocumentKind, year: i32) -> Result<(), StoreError>;
    /// Every issued number of `kind` starting with the year prefix.
    async fn document_numbers(
        &mut self,
        tenant_id: TenantId,
        kind: DocumentKind,
        year: i32,
    ) -> Result<Vec<String>, StoreError>;

    async fn commit(self) -> Result<(), StoreError>;
}
