use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use brewhouse_core::{
    BatchId, DocumentKind, IngredientId, Location, LocationId, MovementId, PurchaseOrderId, Recipe,
    RecipeId, Supplier, SupplierId, Tank, TankId, TenantId,
};
use brewhouse_inventory::{Ingredient, StockMovement};
use brewhouse_production::{Batch, BatchStatus, BatchStatusHistory};
use brewhouse_purchasing::PurchaseOrder;

use super::{MovementQuery, PurchaseOrderQuery, Store, StoreTx};
use crate::error::StoreError;

#[derive(Debug, Clone, Default)]
struct State {
    recipes: HashMap<(TenantId, RecipeId), Recipe>,
    locations: HashMap<(TenantId, LocationId), Location>,
    tanks: HashMap<(TenantId, TankId), Tank>,
    suppliers: HashMap<(TenantId, SupplierId), Supplier>,
    ingredients: HashMap<(TenantId, IngredientId), Ingredient>,
    // Insertion order; newest-first reads walk these backwards.
    movements: Vec<StockMovement>,
    batches: Vec<Batch>,
    history: Vec<BatchStatusHistory>,
    orders: Vec<PurchaseOrder>,
}

/// In-memory store for tests/dev.
///
/// A transaction holds the single state lock for its whole lifetime and works
/// on a private copy that replaces the shared state on commit. Transactions
/// are therefore fully serialized and a dropped transaction leaves no trace.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct InMemoryTx {
    guard: OwnedMutexGuard<State>,
    draft: State,
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let draft = guard.clone();
        Ok(InMemoryTx { guard, draft })
    }
}

fn unique_violation(operation: &str, what: &str) -> StoreError {
    StoreError::Database {
        operation: operation.to_string(),
        message: format!("unique violation: {what}"),
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn starts_with_prefix<'a>(numbers: impl Iterator<Item = &'a str>, prefix: &str) -> Vec<String> {
    numbers.filter(|n| n.starts_with(prefix)).map(str::to_string).collect()
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn recipe(&mut self, tenant_id: TenantId, id: RecipeId) -> Result<Option<Recipe>, StoreError> {
        Ok(self.draft.recipes.get(&(tenant_id, id)).cloned())
    }

    async fn location(&mut self, tenant_id: TenantId, id: LocationId) -> Result<Option<Location>, StoreError> {
        Ok(self.draft.locations.get(&(tenant_id, id)).cloned())
    }

    async fn tank(&mut self, tenant_id: TenantId, id: TankId) -> Result<Option<Tank>, StoreError> {
        Ok(self.draft.tanks.get(&(tenant_id, id)).cloned())
    }

    async fn supplier(&mut self, tenant_id: TenantId, id: SupplierId) -> Result<Option<Supplier>, StoreError> {
        Ok(self.draft.suppliers.get(&(tenant_id, id)).cloned())
    }

    async fn suppliers(&mut self, tenant_id: TenantId) -> Result<Vec<Supplier>, StoreError> {
        let mut suppliers: Vec<Supplier> = self
            .draft
            .suppliers
            .values()
            .filter(|s| s.tenant_id == tenant_id)
            .cloned()
            .collect();
        suppliers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(suppliers)
    }

    async fn insert_recipe(&mut self, recipe: &Recipe) -> Result<(), StoreError> {
        self.draft.recipes.insert((recipe.tenant_id, recipe.id), recipe.clone());
        Ok(())
    }

    async fn insert_location(&mut self, location: &Location) -> Result<(), StoreError> {
        self.draft.locations.insert((location.tenant_id, location.id), location.clone());
        Ok(())
    }

    async fn insert_tank(&mut self, tank: &Tank) -> Result<(), StoreError> {
        self.draft.tanks.insert((tank.tenant_id, tank.id), tank.clone());
        Ok(())
    }

    async fn insert_supplier(&mut self, supplier: &Supplier) -> Result<(), StoreError> {
        self.draft.suppliers.insert((supplier.tenant_id, supplier.id), supplier.clone());
        Ok(())
    }

    async fn ingredient(&mut self, tenant_id: TenantId, id: IngredientId) -> Result<Option<Ingredient>, StoreError> {
        Ok(self.draft.ingredients.get(&(tenant_id, id)).cloned())
    }

    async fn lock_ingredient(
        &mut self,
        tenant_id: TenantId,
        id: IngredientId,
    ) -> Result<Option<Ingredient>, StoreError> {
        // The transaction already holds the store lock.
        self.ingredient(tenant_id, id).await
    }

    async fn ingredients(&mut self, tenant_id: TenantId) -> Result<Vec<Ingredient>, StoreError> {
        let mut ingredients: Vec<Ingredient> = self
            .draft
            .ingredients
            .values()
            .filter(|i| i.tenant_id == tenant_id)
            .cloned()
            .collect();
        ingredients.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(ingredients)
    }

    async fn ingredients_by_ids(
        &mut self,
        tenant_id: TenantId,
        ids: &[IngredientId],
    ) -> Result<Vec<Ingredient>, StoreError> {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();
        Ok(ids
            .into_iter()
            .filter_map(|id| self.draft.ingredients.get(&(tenant_id, id)).cloned())
            .collect())
    }

    async fn insert_ingredient(&mut self, ingredient: &Ingredient) -> Result<(), StoreError> {
        self.draft
            .ingredients
            .insert((ingredient.tenant_id, ingredient.id), ingredient.clone());
        Ok(())
    }

    async fn save_ingredient(&mut self, ingredient: &Ingredient) -> Result<(), StoreError> {
        match self.draft.ingredients.get_mut(&(ingredient.tenant_id, ingredient.id)) {
            Some(stored) => {
                *stored = ingredient.clone();
                Ok(())
            }
            None => Err(StoreError::corrupt("save_ingredient", "ingredient row missing")),
        }
    }

    async fn delete_ingredient(&mut self, tenant_id: TenantId, id: IngredientId) -> Result<(), StoreError> {
        if self
            .draft
            .movements
            .iter()
            .any(|m| m.tenant_id == tenant_id && m.ingredient_id == id)
        {
            return Err(StoreError::Database {
                operation: "delete_ingredient".to_string(),
                message: "foreign key violation: stock_movements.ingredient_id".to_string(),
            });
        }
        self.draft.ingredients.remove(&(tenant_id, id));
        Ok(())
    }

    async fn insert_movement(&mut self, movement: &StockMovement) -> Result<(), StoreError> {
        if !self
            .draft
            .ingredients
            .contains_key(&(movement.tenant_id, movement.ingredient_id))
        {
            return Err(StoreError::Database {
                operation: "insert_movement".to_string(),
                message: "foreign key violation: stock_movements.ingredient_id".to_string(),
            });
        }
        let location_missing = movement
            .location_id
            .is_some_and(|id| !self.draft.locations.contains_key(&(movement.tenant_id, id)));
        let batch_missing = movement.batch_id.is_some_and(|id| {
            !self
                .draft
                .batches
                .iter()
                .any(|b| b.tenant_id == movement.tenant_id && b.id == id)
        });
        if location_missing || batch_missing {
            return Err(StoreError::Database {
                operation: "insert_movement".to_string(),
                message: "foreign key violation: stock_movements reference".to_string(),
            });
        }
        self.draft.movements.push(movement.clone());
        Ok(())
    }

    async fn movement(&mut self, tenant_id: TenantId, id: MovementId) -> Result<Option<StockMovement>, StoreError> {
        Ok(self
            .draft
            .movements
            .iter()
            .find(|m| m.tenant_id == tenant_id && m.id == id)
            .cloned())
    }

    async fn movements(&mut self, tenant_id: TenantId, query: &MovementQuery) -> Result<Vec<StockMovement>, StoreError> {
        let ingredients = &self.draft.ingredients;
        let mut found: Vec<StockMovement> = self
            .draft
            .movements
            .iter()
            .rev()
            .filter(|m| m.tenant_id == tenant_id)
            .filter(|m| query.ingredient_id.is_none_or(|id| m.ingredient_id == id))
            .filter(|m| query.movement_type.is_none_or(|t| m.movement_type == t))
            .filter(|m| query.batch_id.is_none_or(|id| m.batch_id == Some(id)))
            .filter(|m| query.since.is_none_or(|since| m.moved_at >= since))
            .filter(|m| {
                let Some(needle) = query.search.as_deref() else {
                    return true;
                };
                let name_hit = ingredients
                    .get(&(tenant_id, m.ingredient_id))
                    .is_some_and(|i| contains_ci(&i.name, needle));
                name_hit
                    || m.reference.as_deref().is_some_and(|r| contains_ci(r, needle))
                    || m.reason.as_deref().is_some_and(|r| contains_ci(r, needle))
            })
            .cloned()
            .collect();
        if let Some(limit) = query.limit {
            found.truncate(limit);
        }
        Ok(found)
    }

    async fn batch(&mut self, tenant_id: TenantId, id: BatchId) -> Result<Option<Batch>, StoreError> {
        Ok(self
            .draft
            .batches
            .iter()
            .find(|b| b.tenant_id == tenant_id && b.id == id)
            .cloned())
    }

    async fn lock_batch(&mut self, tenant_id: TenantId, id: BatchId) -> Result<Option<Batch>, StoreError> {
        self.batch(tenant_id, id).await
    }

    async fn batches(&mut self, tenant_id: TenantId, status: Option<BatchStatus>) -> Result<Vec<Batch>, StoreError> {
        let mut found: Vec<Batch> = self
            .draft
            .batches
            .iter()
            .rev()
            .filter(|b| b.tenant_id == tenant_id && status.is_none_or(|s| b.status == s))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn insert_batch(&mut self, batch: &Batch) -> Result<(), StoreError> {
        if self
            .draft
            .batches
            .iter()
            .any(|b| b.tenant_id == batch.tenant_id && b.batch_number == batch.batch_number)
        {
            return Err(unique_violation("insert_batch", "batches (tenant_id, batch_number)"));
        }
        self.draft.batches.push(batch.clone());
        Ok(())
    }

    async fn save_batch(&mut self, batch: &Batch) -> Result<(), StoreError> {
        match self
            .draft
            .batches
            .iter_mut()
            .find(|b| b.tenant_id == batch.tenant_id && b.id == batch.id)
        {
            Some(stored) => {
                *stored = batch.clone();
                Ok(())
            }
            None => Err(StoreError::corrupt("save_batch", "batch row missing")),
        }
    }

    async fn delete_batch(&mut self, tenant_id: TenantId, id: BatchId) -> Result<(), StoreError> {
        if self
            .draft
            .movements
            .iter()
            .any(|m| m.tenant_id == tenant_id && m.batch_id == Some(id))
        {
            return Err(StoreError::Database {
                operation: "delete_batch".to_string(),
                message: "foreign key violation: stock_movements.batch_id".to_string(),
            });
        }
        self.draft.batches.retain(|b| !(b.tenant_id == tenant_id && b.id == id));
        self.draft
            .history
            .retain(|h| !(h.tenant_id == tenant_id && h.batch_id == id));
        Ok(())
    }

    async fn insert_status_history(&mut self, entry: &BatchStatusHistory) -> Result<(), StoreError> {
        self.draft.history.push(entry.clone());
        Ok(())
    }

    async fn status_history(
        &mut self,
        tenant_id: TenantId,
        batch_id: BatchId,
    ) -> Result<Vec<BatchStatusHistory>, StoreError> {
        Ok(self
            .draft
            .history
            .iter()
            .filter(|h| h.tenant_id == tenant_id && h.batch_id == batch_id)
            .cloned()
            .collect())
    }

    async fn purchase_order(
        &mut self,
        tenant_id: TenantId,
        id: PurchaseOrderId,
    ) -> Result<Option<PurchaseOrder>, StoreError> {
        Ok(self
            .draft
            .orders
            .iter()
            .find(|o| o.tenant_id == tenant_id && o.id == id)
            .cloned())
    }

    async fn lock_purchase_order(
        &mut self,
        tenant_id: TenantId,
        id: PurchaseOrderId,
    ) -> Result<Option<PurchaseOrder>, StoreError> {
        self.purchase_order(tenant_id, id).await
    }

    async fn purchase_orders(
        &mut self,
        tenant_id: TenantId,
        query: &PurchaseOrderQuery,
    ) -> Result<Vec<PurchaseOrder>, StoreError> {
        let suppliers = &self.draft.suppliers;
        let mut found: Vec<PurchaseOrder> = self
            .draft
            .orders
            .iter()
            .rev()
            .filter(|o| o.tenant_id == tenant_id)
            .filter(|o| query.status.is_none_or(|s| o.status == s))
            .filter(|o| {
                let Some(needle) = query.search.as_deref() else {
                    return true;
                };
                contains_ci(&o.po_number, needle)
                    || suppliers
                        .get(&(tenant_id, o.supplier_id))
                        .is_some_and(|s| contains_ci(&s.name, needle))
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn insert_purchase_order(&mut self, order: &PurchaseOrder) -> Result<(), StoreError> {
        if self
            .draft
            .orders
            .iter()
            .any(|o| o.tenant_id == order.tenant_id && o.po_number == order.po_number)
        {
            return Err(unique_violation(
                "insert_purchase_order",
                "purchase_orders (tenant_id, po_number)",
            ));
        }
        self.draft.orders.push(order.clone());
        Ok(())
    }

    async fn save_purchase_order(&mut self, order: &PurchaseOrder) -> Result<(), StoreError> {
        match self
            .draft
            .orders
            .iter_mut()
            .find(|o| o.tenant_id == order.tenant_id && o.id == order.id)
        {
            Some(stored) => {
                let items = std::mem::take(&mut stored.items);
                *stored = PurchaseOrder {
                    items,
                    ..order.clone()
                };
                Ok(())
            }
            None => Err(StoreError::corrupt("save_purchase_order", "purchase order row missing")),
        }
    }

    async fn delete_purchase_order(&mut self, tenant_id: TenantId, id: PurchaseOrderId) -> Result<(), StoreError> {
        self.draft.orders.retain(|o| !(o.tenant_id == tenant_id && o.id == id));
        Ok(())
    }

    async fn lock_sequence(&mut self, _tenant_id: TenantId, _kind: DocumentKind, _year: i32) -> Result<(), StoreError> {
        Ok(())
    }

    async fn document_numbers(
        &mut self,
        tenant_id: TenantId,
        kind: DocumentKind,
        year: i32,
    ) -> Result<Vec<String>, StoreError> {
        let prefix = kind.year_prefix(year);
        Ok(match kind {
            DocumentKind::Batch => starts_with_prefix(
                self.draft
                    .batches
                    .iter()
                    .filter(|b| b.tenant_id == tenant_id)
                    .map(|b| b.batch_number.as_str()),
                &prefix,
            ),
            DocumentKind::PurchaseOrder => starts_with_prefix(
                self.draft
                    .orders
                    .iter()
                    .filter(|o| o.tenant_id == tenant_id)
                    .map(|o| o.po_number.as_str()),
                &prefix,
            ),
        })
    }

    async fn commit(self) -> Result<(), StoreError> {
        let InMemoryTx { mut guard, draft } = self;
        *guard = draft;
        Ok(())
    }
}
