//! Postgres-backed record store.
//!
//! ## Locking
//!
//! - Stock changes read the ingredient with `SELECT ... FOR UPDATE`, so the
//!   balance check and the balance write see no concurrent movement.
//! - Document numbers are allocated under a transaction-scoped advisory lock
//!   keyed by tenant, kind and year (`pg_advisory_xact_lock`), released on
//!   commit or rollback.
//!
//! Enum columns are stored as their `SCREAMING_SNAKE_CASE` names and decoded
//! through `FromStr`; a value that fails to decode surfaces as
//! `StoreError::Corrupt`.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use brewhouse_core::{
    BatchId, DocumentKind, DomainError, IngredientId, Location, LocationId, MovementId, PurchaseOrderId,
    Recipe, RecipeId, Supplier, SupplierId, Tank, TankId, TenantId,
};
use brewhouse_inventory::{Ingredient, StockMovement};
use brewhouse_production::{Batch, BatchStatus, BatchStatusHistory};
use brewhouse_purchasing::{PurchaseOrder, PurchaseOrderItem};

use super::{MovementQuery, PurchaseOrderQuery, Store, StoreTx};
use crate::error::{StoreError, map_sqlx_error};

const SCHEMA: &str = include_str!("../../migrations/0001_brewhouse.sql");

/// Postgres store. Cheap to clone; shares the pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create missing tables and indexes. Idempotent.
    #[instrument(skip(self), err)]
    pub async fn apply_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("apply_schema", e))?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(PostgresTx { tx })
    }
}

/// Open Postgres transaction; rolls back when dropped uncommitted.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

// Row decoding

fn id<T: From<Uuid>>(row: &PgRow, column: &str) -> Result<T, sqlx::Error> {
    Ok(T::from(row.try_get::<Uuid, _>(column)?))
}

fn opt_id<T: From<Uuid>>(row: &PgRow, column: &str) -> Result<Option<T>, sqlx::Error> {
    Ok(row.try_get::<Option<Uuid>, _>(column)?.map(T::from))
}

fn named<T: FromStr<Err = DomainError>>(row: &PgRow, column: &str) -> Result<T, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e: DomainError| sqlx::Error::Decode(Box::new(e)))
}

fn version(row: &PgRow) -> Result<u64, sqlx::Error> {
    Ok(row.try_get::<i64, _>("version")? as u64)
}

fn uuid_of<T: Into<Uuid>>(value: Option<T>) -> Option<Uuid> {
    value.map(Into::into)
}

fn recipe_from_row(row: &PgRow) -> Result<Recipe, sqlx::Error> {
    Ok(Recipe {
        id: id(row, "id")?,
        tenant_id: id(row, "tenant_id")?,
        name: row.try_get("name")?,
        style: row.try_get("style")?,
    })
}

fn location_from_row(row: &PgRow) -> Result<Location, sqlx::Error> {
    Ok(Location {
        id: id(row, "id")?,
        tenant_id: id(row, "tenant_id")?,
        name: row.try_get("name")?,
    })
}

fn tank_from_row(row: &PgRow) -> Result<Tank, sqlx::Error> {
    Ok(Tank {
        id: id(row, "id")?,
        tenant_id: id(row, "tenant_id")?,
        name: row.try_get("name")?,
        capacity: row.try_get("capacity")?,
    })
}

fn supplier_from_row(row: &PgRow) -> Result<Supplier, sqlx::Error> {
    Ok(Supplier {
        id: id(row, "id")?,
        tenant_id: id(row, "tenant_id")?,
        name: row.try_get("name")?,
        is_active: row.try_get("is_active")?,
    })
}

fn ingredient_from_row(row: &PgRow) -> Result<Ingredient, sqlx::Error> {
    Ok(Ingredient {
        id: id(row, "id")?,
        tenant_id: id(row, "tenant_id")?,
        name: row.try_get("name")?,
        ingredient_type: named(row, "ingredient_type")?,
        unit: row.try_get("unit")?,
        stock: row.try_get("stock")?,
        cost_per_unit: row.try_get("cost_per_unit")?,
        supplier_id: opt_id(row, "supplier_id")?,
        is_active: row.try_get("is_active")?,
        version: version(row)?,
    })
}

fn movement_from_row(row: &PgRow) -> Result<StockMovement, sqlx::Error> {
    Ok(StockMovement {
        id: id(row, "id")?,
        tenant_id: id(row, "tenant_id")?,
        ingredient_id: id(row, "ingredient_id")?,
        location_id: opt_id(row, "location_id")?,
        batch_id: opt_id(row, "batch_id")?,
        movement_type: named(row, "movement_type")?,
        quantity: row.try_get("quantity")?,
        unit: row.try_get("unit")?,
        reason: row.try_get("reason")?,
        reference: row.try_get("reference")?,
        moved_by: id(row, "moved_by")?,
        moved_at: row.try_get("moved_at")?,
    })
}

fn batch_from_row(row: &PgRow) -> Result<Batch, sqlx::Error> {
    Ok(Batch {
        id: id(row, "id")?,
        tenant_id: id(row, "tenant_id")?,
        recipe_id: id(row, "recipe_id")?,
        location_id: opt_id(row, "location_id")?,
        tank_id: opt_id(row, "tank_id")?,
        batch_number: row.try_get("batch_number")?,
        status: named(row, "status")?,
        expected_volume: row.try_get("expected_volume")?,
        actual_volume: row.try_get("actual_volume")?,
        og: row.try_get("og")?,
        fg: row.try_get("fg")?,
        abv: row.try_get("abv")?,
        brew_date: row.try_get("brew_date")?,
        fermentation_start_date: row.try_get("fermentation_start_date")?,
        packaged_date: row.try_get("packaged_date")?,
        finished_date: row.try_get("finished_date")?,
        notes: row.try_get("notes")?,
        created_by: id(row, "created_by")?,
        created_at: row.try_get("created_at")?,
        version: version(row)?,
    })
}

fn history_from_row(row: &PgRow) -> Result<BatchStatusHistory, sqlx::Error> {
    Ok(BatchStatusHistory {
        id: id(row, "id")?,
        tenant_id: id(row, "tenant_id")?,
        batch_id: id(row, "batch_id")?,
        from_status: named(row, "from_status")?,
        to_status: named(row, "to_status")?,
        changed_by: id(row, "changed_by")?,
        notes: row.try_get("notes")?,
        changed_at: row.try_get("changed_at")?,
    })
}

fn order_from_row(row: &PgRow) -> Result<PurchaseOrder, sqlx::Error> {
    Ok(PurchaseOrder {
        id: id(row, "id")?,
        tenant_id: id(row, "tenant_id")?,
        supplier_id: id(row, "supplier_id")?,
        po_number: row.try_get("po_number")?,
        status: named(row, "status")?,
        order_date: row.try_get("order_date")?,
        expected_date: row.try_get("expected_date")?,
        received_date: row.try_get("received_date")?,
        notes: row.try_get("notes")?,
        total_amount: row.try_get("total_amount")?,
        items: Vec::new(),
        created_by: id(row, "created_by")?,
        created_at: row.try_get("created_at")?,
        version: version(row)?,
    })
}

fn item_from_row(row: &PgRow) -> Result<(PurchaseOrderId, PurchaseOrderItem), sqlx::Error> {
    Ok((
        id(row, "order_id")?,
        PurchaseOrderItem {
            id: id(row, "id")?,
            ingredient_id: id(row, "ingredient_id")?,
            quantity: row.try_get("quantity")?,
            unit: row.try_get("unit")?,
            unit_price: row.try_get("unit_price")?,
            subtotal: row.try_get("subtotal")?,
            notes: row.try_get("notes")?,
        },
    ))
}

fn decode_all<T>(
    operation: &str,
    rows: Vec<PgRow>,
    decode: fn(&PgRow) -> Result<T, sqlx::Error>,
) -> Result<Vec<T>, StoreError> {
    rows.iter()
        .map(|row| decode(row).map_err(|e| map_sqlx_error(operation, e)))
        .collect()
}

fn decode_one<T>(
    operation: &str,
    row: Option<PgRow>,
    decode: fn(&PgRow) -> Result<T, sqlx::Error>,
) -> Result<Option<T>, StoreError> {
    row.as_ref()
        .map(|row| decode(row).map_err(|e| map_sqlx_error(operation, e)))
        .transpose()
}

/// Substring pattern with `\`, `%` and `_` matched literally (`ESCAPE '\'`).
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

impl PostgresTx {
    async fn fetch_optional(
        &mut self,
        operation: &str,
        sql: &'static str,
        tenant_id: TenantId,
        id: Uuid,
    ) -> Result<Option<PgRow>, StoreError> {
        sqlx::query(sql)
            .bind(tenant_id.as_uuid())
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))
    }

    async fn execute_keyed(
        &mut self,
        operation: &str,
        sql: &'static str,
        tenant_id: TenantId,
        id: Uuid,
    ) -> Result<(), StoreError> {
        sqlx::query(sql)
            .bind(tenant_id.as_uuid())
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        Ok(())
    }

    /// Attach line items to already-loaded order headers.
    async fn attach_items(&mut self, tenant_id: TenantId, orders: &mut [PurchaseOrder]) -> Result<(), StoreError> {
        if orders.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = orders.iter().map(|o| *o.id.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT tenant_id, id, order_id, ingredient_id, quantity, unit, unit_price, subtotal, notes
            FROM purchase_order_items
            WHERE tenant_id = $1 AND order_id = ANY($2)
            ORDER BY order_id, line_no ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_purchase_order_items", e))?;

        let mut by_order: HashMap<PurchaseOrderId, Vec<PurchaseOrderItem>> = HashMap::new();
        for (order_id, item) in decode_all("load_purchase_order_items", rows, item_from_row)? {
            by_order.entry(order_id).or_default().push(item);
        }
        for order in orders.iter_mut() {
            order.items = by_order.remove(&order.id).unwrap_or_default();
        }
        Ok(())
    }

    async fn load_order(
        &mut self,
        operation: &str,
        sql: &'static str,
        tenant_id: TenantId,
        id: PurchaseOrderId,
    ) -> Result<Option<PurchaseOrder>, StoreError> {
        let row = self.fetch_optional(operation, sql, tenant_id, *id.as_uuid()).await?;
        let Some(order) = decode_one(operation, row, order_from_row)? else {
            return Ok(None);
        };
        let mut orders = [order];
        self.attach_items(tenant_id, &mut orders).await?;
        let [order] = orders;
        Ok(Some(order))
    }
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn recipe(&mut self, tenant_id: TenantId, id: RecipeId) -> Result<Option<Recipe>, StoreError> {
        let row = self
            .fetch_optional(
                "recipe",
                "SELECT tenant_id, id, name, style FROM recipes WHERE tenant_id = $1 AND id = $2",
                tenant_id,
                *id.as_uuid(),
            )
            .await?;
        decode_one("recipe", row, recipe_from_row)
    }

    async fn location(&mut self, tenant_id: TenantId, id: LocationId) -> Result<Option<Location>, StoreError> {
        let row = self
            .fetch_optional(
                "location",
                "SELECT tenant_id, id, name FROM locations WHERE tenant_id = $1 AND id = $2",
                tenant_id,
                *id.as_uuid(),
            )
            .await?;
        decode_one("location", row, location_from_row)
    }

    async fn tank(&mut self, tenant_id: TenantId, id: TankId) -> Result<Option<Tank>, StoreError> {
        let row = self
            .fetch_optional(
                "tank",
                "SELECT tenant_id, id, name, capacity FROM tanks WHERE tenant_id = $1 AND id = $2",
                tenant_id,
                *id.as_uuid(),
            )
            .await?;
        decode_one("tank", row, tank_from_row)
    }

    async fn supplier(&mut self, tenant_id: TenantId, id: SupplierId) -> Result<Option<Supplier>, StoreError> {
        let row = self
            .fetch_optional(
                "supplier",
                "SELECT tenant_id, id, name, is_active FROM suppliers WHERE tenant_id = $1 AND id = $2",
                tenant_id,
                *id.as_uuid(),
            )
            .await?;
        decode_one("supplier", row, supplier_from_row)
    }

    async fn suppliers(&mut self, tenant_id: TenantId) -> Result<Vec<Supplier>, StoreError> {
        let rows = sqlx::query("SELECT tenant_id, id, name, is_active FROM suppliers WHERE tenant_id = $1 ORDER BY name")
            .bind(tenant_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("suppliers", e))?;
        decode_all("suppliers", rows, supplier_from_row)
    }

    async fn insert_recipe(&mut self, recipe: &Recipe) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO recipes (tenant_id, id, name, style) VALUES ($1, $2, $3, $4)")
            .bind(recipe.tenant_id.as_uuid())
            .bind(recipe.id.as_uuid())
            .bind(&recipe.name)
            .bind(&recipe.style)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_recipe", e))?;
        Ok(())
    }

    async fn insert_location(&mut self, location: &Location) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO locations (tenant_id, id, name) VALUES ($1, $2, $3)")
            .bind(location.tenant_id.as_uuid())
            .bind(location.id.as_uuid())
            .bind(&location.name)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_location", e))?;
        Ok(())
    }

    async fn insert_tank(&mut self, tank: &Tank) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO tanks (tenant_id, id, name, capacity) VALUES ($1, $2, $3, $4)")
            .bind(tank.tenant_id.as_uuid())
            .bind(tank.id.as_uuid())
            .bind(&tank.name)
            .bind(tank.capacity)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_tank", e))?;
        Ok(())
    }

    async fn insert_supplier(&mut self, supplier: &Supplier) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO suppliers (tenant_id, id, name, is_active) VALUES ($1, $2, $3, $4)")
            .bind(supplier.tenant_id.as_uuid())
            .bind(supplier.id.as_uuid())
            .bind(&supplier.name)
            .bind(supplier.is_active)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_supplier", e))?;
        Ok(())
    }

    async fn ingredient(&mut self, tenant_id: TenantId, id: IngredientId) -> Result<Option<Ingredient>, StoreError> {
        let row = self
            .fetch_optional(
                "ingredient",
                "SELECT * FROM ingredients WHERE tenant_id = $1 AND id = $2",
                tenant_id,
                *id.as_uuid(),
            )
            .await?;
        decode_one("ingredient", row, ingredient_from_row)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, ingredient_id = %id), err)]
    async fn lock_ingredient(
        &mut self,
        tenant_id: TenantId,
        id: IngredientId,
    ) -> Result<Option<Ingredient>, StoreError> {
        let row = self
            .fetch_optional(
                "lock_ingredient",
                "SELECT * FROM ingredients WHERE tenant_id = $1 AND id = $2 FOR UPDATE",
                tenant_id,
                *id.as_uuid(),
            )
            .await?;
        decode_one("lock_ingredient", row, ingredient_from_row)
    }

    async fn ingredients(&mut self, tenant_id: TenantId) -> Result<Vec<Ingredient>, StoreError> {
        let rows = sqlx::query("SELECT * FROM ingredients WHERE tenant_id = $1 ORDER BY name")
            .bind(tenant_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("ingredients", e))?;
        decode_all("ingredients", rows, ingredient_from_row)
    }

    async fn ingredients_by_ids(
        &mut self,
        tenant_id: TenantId,
        ids: &[IngredientId],
    ) -> Result<Vec<Ingredient>, StoreError> {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query("SELECT * FROM ingredients WHERE tenant_id = $1 AND id = ANY($2)")
            .bind(tenant_id.as_uuid())
            .bind(&ids)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("ingredients_by_ids", e))?;
        decode_all("ingredients_by_ids", rows, ingredient_from_row)
    }

    async fn insert_ingredient(&mut self, ingredient: &Ingredient) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO ingredients (
                tenant_id, id, name, ingredient_type, unit, stock, cost_per_unit,
                supplier_id, is_active, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(ingredient.tenant_id.as_uuid())
        .bind(ingredient.id.as_uuid())
        .bind(&ingredient.name)
        .bind(ingredient.ingredient_type.as_str())
        .bind(&ingredient.unit)
        .bind(ingredient.stock)
        .bind(ingredient.cost_per_unit)
        .bind(uuid_of(ingredient.supplier_id))
        .bind(ingredient.is_active)
        .bind(ingredient.version as i64)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_ingredient", e))?;
        Ok(())
    }

    async fn save_ingredient(&mut self, ingredient: &Ingredient) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE ingredients
            SET stock = $3, is_active = $4, version = $5
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(ingredient.tenant_id.as_uuid())
        .bind(ingredient.id.as_uuid())
        .bind(ingredient.stock)
        .bind(ingredient.is_active)
        .bind(ingredient.version as i64)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_ingredient", e))?;
        Ok(())
    }

    async fn delete_ingredient(&mut self, tenant_id: TenantId, id: IngredientId) -> Result<(), StoreError> {
        self.execute_keyed(
            "delete_ingredient",
            "DELETE FROM ingredients WHERE tenant_id = $1 AND id = $2",
            tenant_id,
            *id.as_uuid(),
        )
        .await
    }

    #[instrument(skip(self, movement), fields(tenant_id = %movement.tenant_id, movement_id = %movement.id), err)]
    async fn insert_movement(&mut self, movement: &StockMovement) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                tenant_id, id, ingredient_id, location_id, batch_id, movement_type,
                quantity, unit, reason, reference, moved_by, moved_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(movement.tenant_id.as_uuid())
        .bind(movement.id.as_uuid())
        .bind(movement.ingredient_id.as_uuid())
        .bind(uuid_of(movement.location_id))
        .bind(uuid_of(movement.batch_id))
        .bind(movement.movement_type.as_str())
        .bind(movement.quantity)
        .bind(&movement.unit)
        .bind(&movement.reason)
        .bind(&movement.reference)
        .bind(movement.moved_by.as_uuid())
        .bind(movement.moved_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_movement", e))?;
        Ok(())
    }

    async fn movement(&mut self, tenant_id: TenantId, id: MovementId) -> Result<Option<StockMovement>, StoreError> {
        let row = self
            .fetch_optional(
                "movement",
                "SELECT * FROM stock_movements WHERE tenant_id = $1 AND id = $2",
                tenant_id,
                *id.as_uuid(),
            )
            .await?;
        decode_one("movement", row, movement_from_row)
    }

    async fn movements(&mut self, tenant_id: TenantId, query: &MovementQuery) -> Result<Vec<StockMovement>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT m.*
            FROM stock_movements m
            JOIN ingredients i ON i.tenant_id = m.tenant_id AND i.id = m.ingredient_id
            WHERE m.tenant_id = $1
              AND ($2::uuid IS NULL OR m.ingredient_id = $2)
              AND ($3::text IS NULL OR m.movement_type = $3)
              AND ($4::uuid IS NULL OR m.batch_id = $4)
              AND ($5::timestamptz IS NULL OR m.moved_at >= $5)
              AND ($6::text IS NULL
                   OR i.name ILIKE $6 ESCAPE '\'
                   OR m.reference ILIKE $6 ESCAPE '\'
                   OR m.reason ILIKE $6 ESCAPE '\')
            ORDER BY m.seq DESC
            LIMIT $7
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(uuid_of(query.ingredient_id))
        .bind(query.movement_type.map(|t| t.as_str()))
        .bind(uuid_of(query.batch_id))
        .bind(query.since)
        .bind(query.search.as_deref().map(like_pattern))
        .bind(query.limit.map(|l| l as i64))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("movements", e))?;
        decode_all("movements", rows, movement_from_row)
    }

    async fn batch(&mut self, tenant_id: TenantId, id: BatchId) -> Result<Option<Batch>, StoreError> {
        let row = self
            .fetch_optional(
                "batch",
                "SELECT * FROM batches WHERE tenant_id = $1 AND id = $2",
                tenant_id,
                *id.as_uuid(),
            )
            .await?;
        decode_one("batch", row, batch_from_row)
    }

    async fn lock_batch(&mut self, tenant_id: TenantId, id: BatchId) -> Result<Option<Batch>, StoreError> {
        let row = self
            .fetch_optional(
                "lock_batch",
                "SELECT * FROM batches WHERE tenant_id = $1 AND id = $2 FOR UPDATE",
                tenant_id,
                *id.as_uuid(),
            )
            .await?;
        decode_one("lock_batch", row, batch_from_row)
    }

    async fn batches(&mut self, tenant_id: TenantId, status: Option<BatchStatus>) -> Result<Vec<Batch>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM batches
            WHERE tenant_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("batches", e))?;
        decode_all("batches", rows, batch_from_row)
    }

    async fn insert_batch(&mut self, batch: &Batch) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO batches (
                tenant_id, id, recipe_id, location_id, tank_id, batch_number, status,
                expected_volume, actual_volume, og, fg, abv, brew_date,
                fermentation_start_date, packaged_date, finished_date, notes,
                created_by, created_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            "#,
        )
        .bind(batch.tenant_id.as_uuid())
        .bind(batch.id.as_uuid())
        .bind(batch.recipe_id.as_uuid())
        .bind(uuid_of(batch.location_id))
        .bind(uuid_of(batch.tank_id))
        .bind(&batch.batch_number)
        .bind(batch.status.as_str())
        .bind(batch.expected_volume)
        .bind(batch.actual_volume)
        .bind(batch.og)
        .bind(batch.fg)
        .bind(batch.abv)
        .bind(batch.brew_date)
        .bind(batch.fermentation_start_date)
        .bind(batch.packaged_date)
        .bind(batch.finished_date)
        .bind(&batch.notes)
        .bind(batch.created_by.as_uuid())
        .bind(batch.created_at)
        .bind(batch.version as i64)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_batch", e))?;
        Ok(())
    }

    async fn save_batch(&mut self, batch: &Batch) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE batches
            SET status = $3, actual_volume = $4, og = $5, fg = $6, abv = $7,
                fermentation_start_date = $8, packaged_date = $9, finished_date = $10,
                notes = $11, version = $12
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(batch.tenant_id.as_uuid())
        .bind(batch.id.as_uuid())
        .bind(batch.status.as_str())
        .bind(batch.actual_volume)
        .bind(batch.og)
        .bind(batch.fg)
        .bind(batch.abv)
        .bind(batch.fermentation_start_date)
        .bind(batch.packaged_date)
        .bind(batch.finished_date)
        .bind(&batch.notes)
        .bind(batch.version as i64)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_batch", e))?;
        Ok(())
    }

    async fn delete_batch(&mut self, tenant_id: TenantId, id: BatchId) -> Result<(), StoreError> {
        self.execute_keyed(
            "delete_batch",
            "DELETE FROM batches WHERE tenant_id = $1 AND id = $2",
            tenant_id,
            *id.as_uuid(),
        )
        .await
    }

    async fn insert_status_history(&mut self, entry: &BatchStatusHistory) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO batch_status_history (
                tenant_id, id, batch_id, from_status, to_status, changed_by, notes, changed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.tenant_id.as_uuid())
        .bind(entry.id.as_uuid())
        .bind(entry.batch_id.as_uuid())
        .bind(entry.from_status.as_str())
        .bind(entry.to_status.as_str())
        .bind(entry.changed_by.as_uuid())
        .bind(&entry.notes)
        .bind(entry.changed_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_status_history", e))?;
        Ok(())
    }

    async fn status_history(
        &mut self,
        tenant_id: TenantId,
        batch_id: BatchId,
    ) -> Result<Vec<BatchStatusHistory>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM batch_status_history
            WHERE tenant_id = $1 AND batch_id = $2
            ORDER BY changed_at ASC, id ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(batch_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("status_history", e))?;
        decode_all("status_history", rows, history_from_row)
    }

    async fn purchase_order(
        &mut self,
        tenant_id: TenantId,
        id: PurchaseOrderId,
    ) -> Result<Option<PurchaseOrder>, StoreError> {
        self.load_order(
            "purchase_order",
            "SELECT * FROM purchase_orders WHERE tenant_id = $1 AND id = $2",
            tenant_id,
            id,
        )
        .await
    }

    async fn lock_purchase_order(
        &mut self,
        tenant_id: TenantId,
        id: PurchaseOrderId,
    ) -> Result<Option<PurchaseOrder>, StoreError> {
        self.load_order(
            "lock_purchase_order",
            "SELECT * FROM purchase_orders WHERE tenant_id = $1 AND id = $2 FOR UPDATE",
            tenant_id,
            id,
        )
        .await
    }

    async fn purchase_orders(
        &mut self,
        tenant_id: TenantId,
        query: &PurchaseOrderQuery,
    ) -> Result<Vec<PurchaseOrder>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT o.*
            FROM purchase_orders o
            JOIN suppliers s ON s.tenant_id = o.tenant_id AND s.id = o.supplier_id
            WHERE o.tenant_id = $1
              AND ($2::text IS NULL OR o.status = $2)
              AND ($3::text IS NULL OR o.po_number ILIKE $3 ESCAPE '\' OR s.name ILIKE $3 ESCAPE '\')
            ORDER BY o.created_at DESC, o.id DESC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(query.status.map(|s| s.as_str()))
        .bind(query.search.as_deref().map(like_pattern))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("purchase_orders", e))?;
        let mut orders = decode_all("purchase_orders", rows, order_from_row)?;
        self.attach_items(tenant_id, &mut orders).await?;
        Ok(orders)
    }

    async fn insert_purchase_order(&mut self, order: &PurchaseOrder) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO purchase_orders (
                tenant_id, id, supplier_id, po_number, status, order_date, expected_date,
                received_date, notes, total_amount, created_by, created_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(order.tenant_id.as_uuid())
        .bind(order.id.as_uuid())
        .bind(order.supplier_id.as_uuid())
        .bind(&order.po_number)
        .bind(order.status.as_str())
        .bind(order.order_date)
        .bind(order.expected_date)
        .bind(order.received_date)
        .bind(&order.notes)
        .bind(order.total_amount)
        .bind(order.created_by.as_uuid())
        .bind(order.created_at)
        .bind(order.version as i64)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_purchase_order", e))?;

        for (line_no, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO purchase_order_items (
                    tenant_id, id, order_id, line_no, ingredient_id, quantity, unit,
                    unit_price, subtotal, notes
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(order.tenant_id.as_uuid())
            .bind(item.id.as_uuid())
            .bind(order.id.as_uuid())
            .bind(line_no as i32 + 1)
            .bind(item.ingredient_id.as_uuid())
            .bind(item.quantity)
            .bind(&item.unit)
            .bind(item.unit_price)
            .bind(item.subtotal)
            .bind(&item.notes)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_purchase_order_item", e))?;
        }
        Ok(())
    }

    async fn save_purchase_order(&mut self, order: &PurchaseOrder) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE purchase_orders
            SET supplier_id = $3, status = $4, order_date = $5, expected_date = $6,
                received_date = $7, notes = $8, version = $9
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(order.tenant_id.as_uuid())
        .bind(order.id.as_uuid())
        .bind(order.supplier_id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.order_date)
        .bind(order.expected_date)
        .bind(order.received_date)
        .bind(&order.notes)
        .bind(order.version as i64)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_purchase_order", e))?;
        Ok(())
    }

    async fn delete_purchase_order(&mut self, tenant_id: TenantId, id: PurchaseOrderId) -> Result<(), StoreError> {
        self.execute_keyed(
            "delete_purchase_order",
            "DELETE FROM purchase_orders WHERE tenant_id = $1 AND id = $2",
            tenant_id,
            *id.as_uuid(),
        )
        .await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, kind = ?kind, year), err)]
    async fn lock_sequence(&mut self, tenant_id: TenantId, kind: DocumentKind, year: i32) -> Result<(), StoreError> {
        let key = format!("{}:{}:{}", tenant_id, kind.prefix(), year);
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(key)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_sequence", e))?;
        Ok(())
    }

    async fn document_numbers(
        &mut self,
        tenant_id: TenantId,
        kind: DocumentKind,
        year: i32,
    ) -> Result<Vec<String>, StoreError> {
        let sql = match kind {
            DocumentKind::Batch => {
                "SELECT batch_number AS number FROM batches WHERE tenant_id = $1 AND batch_number LIKE $2"
            }
            DocumentKind::PurchaseOrder => {
                "SELECT po_number AS number FROM purchase_orders WHERE tenant_id = $1 AND po_number LIKE $2"
            }
        };
        let rows = sqlx::query(sql)
            .bind(tenant_id.as_uuid())
            .bind(format!("{}%", kind.year_prefix(year)))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("document_numbers", e))?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("number").map_err(|e| map_sqlx_error("document_numbers", e)))
            .collect()
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_matches_wildcards_literally() {
        assert_eq!(like_pattern("otter"), "%otter%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
