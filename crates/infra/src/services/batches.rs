//! Batch lifecycle service.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use brewhouse_core::{
    Aggregate, BatchId, Clock, DocumentKind, LocationId, RecipeId, StatusHistoryId,
    TankId, TenantId, UserId, scoped,
};
use brewhouse_production::{
    Batch, BatchEvent, BatchPatch, BatchStatistics, BatchStatus, BatchStatusHistory, PlanBatch, UpdateBatch,
};

use super::log_rejection;
use crate::error::{ServiceError, ServiceResult};
use crate::sequencer::next_number;
use crate::store::{MovementQuery, Store, StoreTx};

/// Input for planning a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBatch {
    pub recipe_id: RecipeId,
    pub location_id: Option<LocationId>,
    pub tank_id: Option<TankId>,
    pub expected_volume: Decimal,
    pub brew_date: DateTime<Utc>,
    pub notes: Option<String>,
}

pub struct BatchService<S: Store> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: Store> BatchService<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Plan a batch under the next `BR-<year>-NNN` number.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, recipe_id = %input.recipe_id), err)]
    pub async fn create_batch(&self, tenant_id: TenantId, user_id: UserId, input: NewBatch) -> ServiceResult<Batch> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        scoped(tenant_id, tx.recipe(tenant_id, input.recipe_id).await?, "Recipe")?;
        if let Some(id) = input.location_id {
            scoped(tenant_id, tx.location(tenant_id, id).await?, "Location")?;
        }
        if let Some(id) = input.tank_id {
            scoped(tenant_id, tx.tank(tenant_id, id).await?, "Tank")?;
        }

        let cmd = PlanBatch {
            tenant_id,
            batch_id: BatchId::new(),
            recipe_id: input.recipe_id,
            location_id: input.location_id,
            tank_id: input.tank_id,
            expected_volume: input.expected_volume,
            brew_date: input.brew_date,
            notes: input.notes,
            created_by: user_id,
            occurred_at: now,
        };
        let number = next_number(&mut tx, tenant_id, DocumentKind::Batch, now.year()).await?;
        let batch = Batch::plan(&cmd, number.to_string())?;
        tx.insert_batch(&batch).await?;
        tx.commit().await?;

        info!(batch_id = %batch.id, batch_number = %batch.batch_number, "batch planned");
        Ok(batch)
    }

    /// Apply a patch; a status change also appends a history entry.
    #[instrument(skip(self, patch), fields(tenant_id = %tenant_id, batch_id = %batch_id), err)]
    pub async fn update_batch(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        batch_id: BatchId,
        patch: BatchPatch,
    ) -> ServiceResult<Batch> {
        let mut tx = self.store.begin().await?;
        let mut batch = scoped(tenant_id, tx.lock_batch(tenant_id, batch_id).await?, "Batch")?;

        let cmd = UpdateBatch {
            tenant_id,
            batch_id,
            changed_by: user_id,
            patch,
            occurred_at: self.clock.now(),
        };
        let events = batch
            .execute(&cmd)
            .map_err(ServiceError::from)
            .inspect_err(|e| log_rejection("update_batch", e))?;

        for event in &events {
            if let BatchEvent::StatusChanged(changed) = event {
                tx.insert_status_history(&BatchStatusHistory::record(StatusHistoryId::new(), changed))
                    .await?;
                info!(from = %changed.from, to = %changed.to, "batch status changed");
            }
        }
        tx.save_batch(&batch).await?;
        tx.commit().await?;

        Ok(batch)
    }

    pub async fn get_batch(&self, tenant_id: TenantId, batch_id: BatchId) -> ServiceResult<Batch> {
        let mut tx = self.store.begin().await?;
        Ok(scoped(tenant_id, tx.batch(tenant_id, batch_id).await?, "Batch")?)
    }

    /// Newest first.
    pub async fn list_batches(&self, tenant_id: TenantId, status: Option<BatchStatus>) -> ServiceResult<Vec<Batch>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.batches(tenant_id, status).await?)
    }

    /// Status changes in the order they happened.
    pub async fn status_history(
        &self,
        tenant_id: TenantId,
        batch_id: BatchId,
    ) -> ServiceResult<Vec<BatchStatusHistory>> {
        let mut tx = self.store.begin().await?;
        scoped(tenant_id, tx.batch(tenant_id, batch_id).await?, "Batch")?;
        Ok(tx.status_history(tenant_id, batch_id).await?)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, batch_id = %batch_id), err)]
    pub async fn remove_batch(&self, tenant_id: TenantId, batch_id: BatchId) -> ServiceResult<()> {
        let mut tx = self.store.begin().await?;
        let batch = scoped(tenant_id, tx.lock_batch(tenant_id, batch_id).await?, "Batch")?;
        let referencing = MovementQuery {
            batch_id: Some(batch_id),
            limit: Some(1),
            ..MovementQuery::default()
        };
        let referenced = !tx.movements(tenant_id, &referencing).await?.is_empty();
        batch.ensure_removable(referenced)?;
        tx.delete_batch(tenant_id, batch_id).await?;
        tx.commit().await?;

        info!(batch_number = %batch.batch_number, "batch removed");
        Ok(())
    }

    pub async fn statistics(&self, tenant_id: TenantId) -> ServiceResult<BatchStatistics> {
        let mut tx = self.store.begin().await?;
        let batches = tx.batches(tenant_id, None).await?;
        Ok(BatchStatistics::from_batches(&batches))
    }
}
