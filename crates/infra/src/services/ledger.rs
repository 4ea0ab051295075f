//! Inventory ledger service.
//!
//! `post_movement` is the only code path that changes an ingredient's stock:
//! it locks the ingredient row, lets the aggregate decide, appends the ledger
//! entry and writes the new balance, all on the caller's transaction. Both
//! manual movements and purchase-order receipts go through it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use brewhouse_core::{
    BatchId, Clock, DomainError, IngredientId, LocationId, MovementId, TenantId, UserId, scoped,
};
use brewhouse_inventory::{Ingredient, MovementStats, MovementType, RecordMovement, StockMovement, report};

use super::log_rejection;
use crate::error::{ServiceError, ServiceResult};
use crate::store::{MovementQuery, Store, StoreTx};

/// Maximum rows returned by `list_movements`.
pub const LIST_LIMIT: usize = 100;
/// Maximum rows returned by `recent_movements`.
pub const RECENT_LIMIT: usize = 50;
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

/// Input for a manual stock movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMovement {
    pub ingredient_id: IngredientId,
    pub movement_type: MovementType,
    pub quantity: Decimal,
    /// Defaults to the ingredient's unit.
    pub unit: Option<String>,
    pub location_id: Option<LocationId>,
    pub batch_id: Option<BatchId>,
    pub reason: Option<String>,
    pub reference: Option<String>,
    /// Defaults to now.
    pub moved_at: Option<DateTime<Utc>>,
}

impl NewMovement {
    pub fn new(ingredient_id: IngredientId, movement_type: MovementType, quantity: Decimal) -> Self {
        Self {
            ingredient_id,
            movement_type,
            quantity,
            unit: None,
            location_id: None,
            batch_id: None,
            reason: None,
            reference: None,
            moved_at: None,
        }
    }
}

/// A ledger entry with the display data of what it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub movement: StockMovement,
    pub ingredient_name: String,
    pub location_name: Option<String>,
    pub batch_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementFilter {
    pub ingredient_id: Option<IngredientId>,
    pub movement_type: Option<MovementType>,
    /// Case-insensitive match on ingredient name, reference or reason.
    pub search: Option<String>,
}

/// Start of a trailing window of `days` (default 30) ending at `now`.
pub(crate) fn window_start(now: DateTime<Utc>, days: Option<i64>) -> Result<DateTime<Utc>, DomainError> {
    let days = days.unwrap_or(DEFAULT_WINDOW_DAYS);
    if days < 0 {
        return Err(DomainError::bad_request("days must not be negative"));
    }
    Duration::try_days(days)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| DomainError::bad_request(format!("days out of range: {days}")))
}

/// Lock the ingredient, decide, append the entry and store the new balance.
pub(crate) async fn post_movement<T: StoreTx>(
    tx: &mut T,
    cmd: &RecordMovement,
) -> ServiceResult<(Ingredient, StockMovement)> {
    let locked = tx.lock_ingredient(cmd.tenant_id, cmd.ingredient_id).await?;
    let mut ingredient = scoped(cmd.tenant_id, locked, "Ingredient")?;
    let movement = ingredient.record(cmd)?;
    tx.insert_movement(&movement).await?;
    tx.save_ingredient(&ingredient).await?;
    Ok((ingredient, movement))
}

/// Resolve ingredient names, location names and batch numbers for display.
async fn describe<T: StoreTx>(
    tx: &mut T,
    tenant_id: TenantId,
    movements: Vec<StockMovement>,
) -> ServiceResult<Vec<MovementRecord>> {
    let names: HashMap<IngredientId, String> = tx
        .ingredients(tenant_id)
        .await?
        .into_iter()
        .map(|i| (i.id, i.name))
        .collect();
    let mut locations: HashMap<LocationId, Option<String>> = HashMap::new();
    let mut batches: HashMap<BatchId, Option<String>> = HashMap::new();

    let mut records = Vec::with_capacity(movements.len());
    for movement in movements {
        let location_name = match movement.location_id {
            Some(id) => {
                if !locations.contains_key(&id) {
                    let name = tx.location(tenant_id, id).await?.map(|l| l.name);
                    locations.insert(id, name);
                }
                locations.get(&id).cloned().flatten()
            }
            None => None,
        };
        let batch_number = match movement.batch_id {
            Some(id) => {
                if !batches.contains_key(&id) {
                    let number = tx.batch(tenant_id, id).await?.map(|b| b.batch_number);
                    batches.insert(id, number);
                }
                batches.get(&id).cloned().flatten()
            }
            None => None,
        };
        records.push(MovementRecord {
            ingredient_name: names.get(&movement.ingredient_id).cloned().unwrap_or_default(),
            location_name,
            batch_number,
            movement,
        });
    }
    Ok(records)
}

/// Records stock movements and answers ledger queries.
pub struct InventoryLedger<S: Store> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: Store> InventoryLedger<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Append one movement and update the ingredient's balance atomically.
    #[instrument(
        skip(self, input),
        fields(tenant_id = %tenant_id, ingredient_id = %input.ingredient_id, movement_type = %input.movement_type),
        err
    )]
    pub async fn record_movement(
        &self,
        tenant_id: TenantId,
        actor: UserId,
        input: NewMovement,
    ) -> ServiceResult<MovementRecord> {
        let mut tx = self.store.begin().await?;

        let location = match input.location_id {
            Some(id) => {
                let found = tx.location(tenant_id, id).await?;
                Some(
                    scoped(tenant_id, found, "Location")
                        .map_err(ServiceError::from)
                        .inspect_err(|e| log_rejection("record_movement", e))?,
                )
            }
            None => None,
        };
        // Held until commit so a concurrent remove_batch cannot orphan the entry.
        let batch = match input.batch_id {
            Some(id) => {
                let found = tx.lock_batch(tenant_id, id).await?;
                Some(
                    scoped(tenant_id, found, "Batch")
                        .map_err(ServiceError::from)
                        .inspect_err(|e| log_rejection("record_movement", e))?,
                )
            }
            None => None,
        };

        let cmd = RecordMovement {
            tenant_id,
            movement_id: MovementId::new(),
            ingredient_id: input.ingredient_id,
            movement_type: input.movement_type,
            quantity: input.quantity,
            unit: input.unit,
            location_id: input.location_id,
            batch_id: input.batch_id,
            reason: input.reason,
            reference: input.reference,
            moved_by: actor,
            moved_at: input.moved_at.unwrap_or_else(|| self.clock.now()),
        };
        let (ingredient, movement) = post_movement(&mut tx, &cmd)
            .await
            .inspect_err(|e| log_rejection("record_movement", e))?;
        tx.commit().await?;

        info!(
            movement_id = %movement.id,
            quantity = %movement.quantity,
            stock = ?ingredient.stock,
            "stock movement recorded"
        );
        Ok(MovementRecord {
            movement,
            ingredient_name: ingredient.name,
            location_name: location.map(|l| l.name),
            batch_number: batch.map(|b| b.batch_number),
        })
    }

    /// Newest first, at most `LIST_LIMIT` entries.
    pub async fn list_movements(
        &self,
        tenant_id: TenantId,
        filter: MovementFilter,
    ) -> ServiceResult<Vec<MovementRecord>> {
        let mut tx = self.store.begin().await?;
        let query = MovementQuery {
            ingredient_id: filter.ingredient_id,
            movement_type: filter.movement_type,
            search: filter.search.filter(|s| !s.trim().is_empty()),
            limit: Some(LIST_LIMIT),
            ..MovementQuery::default()
        };
        let movements = tx.movements(tenant_id, &query).await?;
        describe(&mut tx, tenant_id, movements).await
    }

    pub async fn get_movement(&self, tenant_id: TenantId, id: MovementId) -> ServiceResult<MovementRecord> {
        let mut tx = self.store.begin().await?;
        let movement = scoped(tenant_id, tx.movement(tenant_id, id).await?, "Stock movement")?;
        let mut records = describe(&mut tx, tenant_id, vec![movement]).await?;
        records
            .pop()
            .ok_or_else(|| DomainError::not_found("Stock movement").into())
    }

    /// Full history of one ingredient, newest first.
    pub async fn movements_for_ingredient(
        &self,
        tenant_id: TenantId,
        ingredient_id: IngredientId,
    ) -> ServiceResult<Vec<MovementRecord>> {
        let mut tx = self.store.begin().await?;
        scoped(tenant_id, tx.ingredient(tenant_id, ingredient_id).await?, "Ingredient")?;
        let query = MovementQuery {
            ingredient_id: Some(ingredient_id),
            ..MovementQuery::default()
        };
        let movements = tx.movements(tenant_id, &query).await?;
        describe(&mut tx, tenant_id, movements).await
    }

    /// Movements in the trailing `days` (default 30), at most `RECENT_LIMIT`.
    pub async fn recent_movements(
        &self,
        tenant_id: TenantId,
        days: Option<i64>,
    ) -> ServiceResult<Vec<MovementRecord>> {
        let since = window_start(self.clock.now(), days)?;
        let mut tx = self.store.begin().await?;
        let query = MovementQuery {
            since: Some(since),
            limit: Some(RECENT_LIMIT),
            ..MovementQuery::default()
        };
        let movements = tx.movements(tenant_id, &query).await?;
        describe(&mut tx, tenant_id, movements).await
    }

    pub async fn movement_stats(&self, tenant_id: TenantId) -> ServiceResult<MovementStats> {
        let mut tx = self.store.begin().await?;
        let movements = tx.movements(tenant_id, &MovementQuery::default()).await?;
        Ok(report::movement_stats(&movements))
    }
}
