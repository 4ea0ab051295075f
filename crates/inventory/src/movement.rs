use core::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use brewhouse_core::{
    Aggregate, BatchId, DomainError, Event, IngredientId, LocationId, MovementId, TenantId,
    TenantScoped, UserId,
};

use crate::ingredient::Ingredient;

/// Kind of stock-affecting event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    In,
    Out,
    Adjustment,
    Transfer,
    Brewing,
    Spoilage,
}

/// How a movement type changes the projected balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockEffect {
    Increase,
    Decrease,
    /// Location change only.
    Neutral,
    /// Balance is set to the movement quantity.
    Reset,
}

impl MovementType {
    pub const ALL: [MovementType; 6] = [
        MovementType::In,
        MovementType::Out,
        MovementType::Adjustment,
        MovementType::Transfer,
        MovementType::Brewing,
        MovementType::Spoilage,
    ];

    /// Types counted as consumption in trend reports.
    pub const CONSUMPTION: [MovementType; 3] =
        [MovementType::Out, MovementType::Brewing, MovementType::Spoilage];

    pub fn as_str(self) -> &'static str {
        match self {
            MovementType::In => "IN",
            MovementType::Out => "OUT",
            MovementType::Adjustment => "ADJUSTMENT",
            MovementType::Transfer => "TRANSFER",
            MovementType::Brewing => "BREWING",
            MovementType::Spoilage => "SPOILAGE",
        }
    }

    pub fn effect(self) -> StockEffect {
        match self {
            MovementType::In => StockEffect::Increase,
            MovementType::Out | MovementType::Brewing | MovementType::Spoilage => StockEffect::Decrease,
            MovementType::Transfer => StockEffect::Neutral,
            MovementType::Adjustment => StockEffect::Reset,
        }
    }

    pub fn is_decrement(self) -> bool {
        self.effect() == StockEffect::Decrease
    }

    /// Signed delta for non-resetting types; `None` for ADJUSTMENT.
    pub fn signed_delta(self, quantity: Decimal) -> Option<Decimal> {
        match self.effect() {
            StockEffect::Increase => Some(quantity),
            StockEffect::Decrease => Some(-quantity),
            StockEffect::Neutral => Some(Decimal::ZERO),
            StockEffect::Reset => None,
        }
    }

    /// Project one movement onto a balance.
    ///
    /// An untracked balance stays untracked under deltas; only a reset
    /// establishes it.
    pub fn apply_to(self, balance: Option<Decimal>, quantity: Decimal) -> Option<Decimal> {
        match self.signed_delta(quantity) {
            Some(delta) => balance.map(|b| b + delta),
            None => Some(quantity),
        }
    }
}

impl core::fmt::Display for MovementType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MovementType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown movement type: {s}")))
    }
}

/// Ledger entry. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub tenant_id: TenantId,
    pub ingredient_id: IngredientId,
    pub location_id: Option<LocationId>,
    pub batch_id: Option<BatchId>,
    pub movement_type: MovementType,
    pub quantity: Decimal,
    pub unit: String,
    pub reason: Option<String>,
    pub reference: Option<String>,
    pub moved_by: UserId,
    pub moved_at: DateTime<Utc>,
}

impl Event for StockMovement {
    fn event_type(&self) -> &'static str {
        match self.movement_type {
            MovementType::In => "inventory.stock.in",
            MovementType::Out => "inventory.stock.out",
            MovementType::Adjustment => "inventory.stock.adjusted",
            MovementType::Transfer => "inventory.stock.transferred",
            MovementType::Brewing => "inventory.stock.brewed",
            MovementType::Spoilage => "inventory.stock.spoiled",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.moved_at
    }
}

impl TenantScoped for StockMovement {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Command: RecordMovement.
///
/// Location and batch references are resolved by the caller before the
/// command reaches the aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMovement {
    pub tenant_id: TenantId,
    pub movement_id: MovementId,
    pub ingredient_id: IngredientId,
    pub movement_type: MovementType,
    pub quantity: Decimal,
    /// Defaults to the ingredient's unit.
    pub unit: Option<String>,
    pub location_id: Option<LocationId>,
    pub batch_id: Option<BatchId>,
    pub reason: Option<String>,
    pub reference: Option<String>,
    pub moved_by: UserId,
    pub moved_at: DateTime<Utc>,
}

impl Aggregate for Ingredient {
    type Command = RecordMovement;
    type Event = StockMovement;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        self.stock = event.movement_type.apply_to(self.stock, event.quantity);
        self.version += 1;
    }

    fn handle(&self, cmd: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        Ok(vec![self.decide(cmd)?])
    }
}

impl Ingredient {
    /// Validate `cmd` and apply the resulting ledger entry.
    pub fn record(&mut self, cmd: &RecordMovement) -> Result<StockMovement, DomainError> {
        let movement = self.decide(cmd)?;
        self.apply(&movement);
        Ok(movement)
    }

    fn decide(&self, cmd: &RecordMovement) -> Result<StockMovement, DomainError> {
        if cmd.tenant_id != self.tenant_id || cmd.ingredient_id != self.id {
            return Err(DomainError::not_found("Ingredient"));
        }
        if cmd.quantity <= Decimal::ZERO {
            return Err(DomainError::bad_request("quantity must be positive"));
        }

        let unit = cmd.unit.clone().unwrap_or_else(|| self.unit.clone());

        // Untracked balances are not constrained.
        if cmd.movement_type.is_decrement() {
            if let Some(available) = self.stock {
                if cmd.quantity > available {
                    return Err(DomainError::insufficient_stock(available, cmd.quantity, unit));
                }
            }
        }

        Ok(StockMovement {
            id: cmd.movement_id,
            tenant_id: cmd.tenant_id,
            ingredient_id: cmd.ingredient_id,
            location_id: cmd.location_id,
            batch_id: cmd.batch_id,
            movement_type: cmd.movement_type,
            quantity: cmd.quantity,
            unit,
            reason: cmd.reason.clone(),
            reference: cmd.reference.clone(),
            moved_by: cmd.moved_by,
            moved_at: cmd.moved_at,
        })
    }
}

/// Rebuild a balance from an ingredient's ledger in recording order.
///
/// The projected `stock` must always equal this value.
pub fn replay_balance<'a>(movements: impl IntoIterator<Item = &'a StockMovement>) -> Option<Decimal> {
    movements
        .into_iter()
        .fold(None, |balance, m| m.movement_type.apply_to(balance, m.quantity))
}
