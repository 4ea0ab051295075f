//! Catalog writes: ingredients and the reference records batches and orders
//! point at.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument};

use brewhouse_core::{
    Clock, DomainError, IngredientId, Location, LocationId, MovementId, Recipe, RecipeId, Supplier, SupplierId,
    Tank, TankId, TenantId, UserId, scoped,
};
use brewhouse_inventory::{Ingredient, MovementType, NewIngredient, RecordMovement};

use super::ledger::post_movement;
use crate::error::ServiceResult;
use crate::store::{MovementQuery, Store, StoreTx};

fn required_name(name: &str) -> Result<String, DomainError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("name cannot be empty"));
    }
    Ok(name.to_string())
}

pub struct CatalogService<S: Store> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: Store> CatalogService<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Register an ingredient. An opening stock is posted as an ADJUSTMENT so
    /// the balance has a ledger entry from the start.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, name = %input.name), err)]
    pub async fn register_ingredient(
        &self,
        tenant_id: TenantId,
        actor: UserId,
        input: NewIngredient,
    ) -> ServiceResult<Ingredient> {
        let mut tx = self.store.begin().await?;
        if let Some(id) = input.supplier_id {
            scoped(tenant_id, tx.supplier(tenant_id, id).await?, "Supplier")?;
        }

        let mut ingredient = Ingredient::register(tenant_id, IngredientId::new(), &input)?;
        tx.insert_ingredient(&ingredient).await?;

        if let Some(quantity) = input.opening_stock {
            let opening = RecordMovement {
                tenant_id,
                movement_id: MovementId::new(),
                ingredient_id: ingredient.id,
                movement_type: MovementType::Adjustment,
                quantity,
                unit: None,
                location_id: None,
                batch_id: None,
                reason: Some("Opening stock".to_string()),
                reference: None,
                moved_by: actor,
                moved_at: self.clock.now(),
            };
            let (updated, _) = post_movement(&mut tx, &opening).await?;
            ingredient = updated;
        }
        tx.commit().await?;

        info!(ingredient_id = %ingredient.id, stock = ?ingredient.stock, "ingredient registered");
        Ok(ingredient)
    }

    /// Hide an ingredient from stock reports without touching its ledger.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, ingredient_id = %id), err)]
    pub async fn deactivate_ingredient(&self, tenant_id: TenantId, id: IngredientId) -> ServiceResult<Ingredient> {
        let mut tx = self.store.begin().await?;
        let mut ingredient = scoped(tenant_id, tx.lock_ingredient(tenant_id, id).await?, "Ingredient")?;
        ingredient.is_active = false;
        tx.save_ingredient(&ingredient).await?;
        tx.commit().await?;
        Ok(ingredient)
    }

    /// Physically delete an ingredient that no movement references.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, ingredient_id = %id), err)]
    pub async fn remove_ingredient(&self, tenant_id: TenantId, id: IngredientId) -> ServiceResult<()> {
        let mut tx = self.store.begin().await?;
        scoped(tenant_id, tx.lock_ingredient(tenant_id, id).await?, "Ingredient")?;
        let query = MovementQuery {
            ingredient_id: Some(id),
            limit: Some(1),
            ..MovementQuery::default()
        };
        if !tx.movements(tenant_id, &query).await?.is_empty() {
            return Err(DomainError::conflict("ingredient has stock movements; deactivate it instead").into());
        }
        tx.delete_ingredient(tenant_id, id).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn register_recipe(
        &self,
        tenant_id: TenantId,
        name: &str,
        style: Option<String>,
    ) -> ServiceResult<Recipe> {
        let recipe = Recipe {
            id: RecipeId::new(),
            tenant_id,
            name: required_name(name)?,
            style,
        };
        let mut tx = self.store.begin().await?;
        tx.insert_recipe(&recipe).await?;
        tx.commit().await?;
        Ok(recipe)
    }

    pub async fn register_location(&self, tenant_id: TenantId, name: &str) -> ServiceResult<Location> {
        let location = Location {
            id: LocationId::new(),
            tenant_id,
            name: required_name(name)?,
        };
        let mut tx = self.store.begin().await?;
        tx.insert_location(&location).await?;
        tx.commit().await?;
        Ok(location)
    }

    pub async fn register_tank(
        &self,
        tenant_id: TenantId,
        name: &str,
        capacity: Option<Decimal>,
    ) -> ServiceResult<Tank> {
        if capacity.is_some_and(|c| c <= Decimal::ZERO) {
            return Err(DomainError::validation("capacity must be positive").into());
        }
        let tank = Tank {
            id: TankId::new(),
            tenant_id,
            name: required_name(name)?,
            capacity,
        };
        let mut tx = self.store.begin().await?;
        tx.insert_tank(&tank).await?;
        tx.commit().await?;
        Ok(tank)
    }

    pub async fn register_supplier(&self, tenant_id: TenantId, name: &str) -> ServiceResult<Supplier> {
        let supplier = Supplier {
            id: SupplierId::new(),
            tenant_id,
            name: required_name(name)?,
            is_active: true,
        };
        let mut tx = self.store.begin().await?;
        tx.insert_supplier(&supplier).await?;
        tx.commit().await?;
        Ok(supplier)
    }
}
