//! Read-side projections over ingredients and the movement ledger.
//!
//! Everything here is a pure function of already-committed state. Untracked
//! (`None`) stock counts as zero for thresholds but is still classified as
//! out of stock.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use brewhouse_core::{IngredientId, SupplierId};

use crate::ingredient::{Ingredient, IngredientType};
use crate::movement::{MovementType, StockMovement};

/// Default boundary between LOW_STOCK and ADEQUATE.
pub const DEFAULT_LOW_STOCK_THRESHOLD: Decimal = Decimal::TEN;

const ADEQUATE_LIMIT: Decimal = Decimal::from_parts(50, 0, 0, false, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockStatus {
    OutOfStock,
    LowStock,
    Adequate,
    Good,
}

impl StockStatus {
    pub fn classify(stock: Option<Decimal>, low_threshold: Decimal) -> Self {
        match stock {
            None => StockStatus::OutOfStock,
            Some(s) if s <= Decimal::ZERO => StockStatus::OutOfStock,
            Some(s) if s < low_threshold => StockStatus::LowStock,
            Some(s) if s < ADEQUATE_LIMIT => StockStatus::Adequate,
            Some(_) => StockStatus::Good,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub ingredient_id: IngredientId,
    pub name: String,
    pub ingredient_type: IngredientType,
    pub unit: String,
    pub stock: Decimal,
    pub tracked: bool,
    pub cost_per_unit: Option<Decimal>,
    pub value: Decimal,
    pub status: StockStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockAlert {
    pub ingredient_id: IngredientId,
    pub name: String,
    pub ingredient_type: IngredientType,
    pub unit: String,
    pub stock: Decimal,
    pub supplier_id: Option<SupplierId>,
    pub alert: StockStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeStock {
    pub ingredient_type: IngredientType,
    pub count: usize,
    pub total_stock: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementTypeSummary {
    pub movement_type: MovementType,
    pub count: usize,
    pub total_quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementStats {
    pub total: usize,
    pub by_type: Vec<MovementTypeSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionTrend {
    pub ingredient_id: IngredientId,
    pub name: String,
    pub ingredient_type: IngredientType,
    pub total_consumed: Decimal,
    pub movement_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryValueLine {
    pub ingredient_id: IngredientId,
    pub name: String,
    pub ingredient_type: IngredientType,
    pub unit: String,
    pub stock: Decimal,
    pub cost_per_unit: Decimal,
    pub total_value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryValueReport {
    pub items: Vec<InventoryValueLine>,
    pub total_value: Decimal,
    pub item_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryDashboard {
    pub total_ingredients: usize,
    pub active_ingredients: usize,
    pub low_stock: usize,
    pub out_of_stock: usize,
    pub total_stock: Decimal,
    /// Movements recorded in the trailing seven days.
    pub recent_movements: usize,
}

fn active(ingredients: &[Ingredient]) -> impl Iterator<Item = &Ingredient> {
    ingredients.iter().filter(|i| i.is_active)
}

/// Active ingredients by name with their classification.
pub fn stock_levels(ingredients: &[Ingredient], low_threshold: Decimal) -> Vec<StockLevel> {
    let mut levels: Vec<StockLevel> = active(ingredients)
        .map(|i| StockLevel {
            ingredient_id: i.id,
            name: i.name.clone(),
            ingredient_type: i.ingredient_type,
            unit: i.unit.clone(),
            stock: i.stock_or_zero(),
            tracked: i.stock.is_some(),
            cost_per_unit: i.cost_per_unit,
            value: i.stock_value(),
            status: StockStatus::classify(i.stock, low_threshold),
        })
        .collect();
    levels.sort_by(|a, b| a.name.cmp(&b.name));
    levels
}

/// Active ingredients below `threshold` (or untracked), lowest first.
pub fn low_stock(ingredients: &[Ingredient], threshold: Decimal) -> Vec<LowStockAlert> {
    let mut alerts: Vec<LowStockAlert> = active(ingredients)
        .filter(|i| i.stock.is_none_or(|s| s < threshold))
        .map(|i| LowStockAlert {
            ingredient_id: i.id,
            name: i.name.clone(),
            ingredient_type: i.ingredient_type,
            unit: i.unit.clone(),
            stock: i.stock_or_zero(),
            supplier_id: i.supplier_id,
            alert: match i.stock {
                Some(s) if s > Decimal::ZERO => StockStatus::LowStock,
                _ => StockStatus::OutOfStock,
            },
        })
        .collect();
    alerts.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.name.cmp(&b.name)));
    alerts
}

pub fn stock_by_type(ingredients: &[Ingredient]) -> Vec<TypeStock> {
    let mut grouped: BTreeMap<IngredientType, TypeStock> = BTreeMap::new();
    for i in active(ingredients) {
        let entry = grouped.entry(i.ingredient_type).or_insert_with(|| TypeStock {
            ingredient_type: i.ingredient_type,
            count: 0,
            total_stock: Decimal::ZERO,
        });
        entry.count += 1;
        entry.total_stock += i.stock_or_zero();
    }
    grouped.into_values().collect()
}

fn summarize<'a>(movements: impl Iterator<Item = &'a StockMovement>) -> Vec<MovementTypeSummary> {
    let mut grouped: BTreeMap<MovementType, MovementTypeSummary> = BTreeMap::new();
    for m in movements {
        let entry = grouped.entry(m.movement_type).or_insert_with(|| MovementTypeSummary {
            movement_type: m.movement_type,
            count: 0,
            total_quantity: Decimal::ZERO,
        });
        entry.count += 1;
        entry.total_quantity += m.quantity;
    }
    grouped.into_values().collect()
}

/// Count and quantity per movement type over the whole ledger.
pub fn movement_stats(movements: &[StockMovement]) -> MovementStats {
    MovementStats {
        total: movements.len(),
        by_type: summarize(movements.iter()),
    }
}

/// Count and quantity per movement type for movements at or after `since`.
pub fn movement_summary_since(movements: &[StockMovement], since: DateTime<Utc>) -> Vec<MovementTypeSummary> {
    summarize(movements.iter().filter(|m| m.moved_at >= since))
}

/// Consumption (OUT, BREWING, SPOILAGE) per ingredient since `since`, largest first.
pub fn consumption_trends(
    ingredients: &[Ingredient],
    movements: &[StockMovement],
    since: DateTime<Utc>,
) -> Vec<ConsumptionTrend> {
    let by_id: HashMap<IngredientId, &Ingredient> = ingredients.iter().map(|i| (i.id, i)).collect();
    let mut grouped: HashMap<IngredientId, ConsumptionTrend> = HashMap::new();

    for m in movements
        .iter()
        .filter(|m| m.moved_at >= since && MovementType::CONSUMPTION.contains(&m.movement_type))
    {
        let Some(ingredient) = by_id.get(&m.ingredient_id) else {
            continue;
        };
        let entry = grouped.entry(m.ingredient_id).or_insert_with(|| ConsumptionTrend {
            ingredient_id: ingredient.id,
            name: ingredient.name.clone(),
            ingredient_type: ingredient.ingredient_type,
            total_consumed: Decimal::ZERO,
            movement_count: 0,
        });
        entry.total_consumed += m.quantity;
        entry.movement_count += 1;
    }

    let mut trends: Vec<ConsumptionTrend> = grouped.into_values().collect();
    trends.sort_by(|a, b| b.total_consumed.cmp(&a.total_consumed).then_with(|| a.name.cmp(&b.name)));
    trends
}

/// Value of active ingredients with positive stock and cost.
pub fn inventory_value(ingredients: &[Ingredient]) -> InventoryValueReport {
    let mut items: Vec<InventoryValueLine> = active(ingredients)
        .filter_map(|i| match (i.stock, i.cost_per_unit) {
            (Some(stock), Some(cost)) if stock > Decimal::ZERO && cost > Decimal::ZERO => {
                Some(InventoryValueLine {
                    ingredient_id: i.id,
                    name: i.name.clone(),
                    ingredient_type: i.ingredient_type,
                    unit: i.unit.clone(),
                    stock,
                    cost_per_unit: cost,
                    total_value: stock * cost,
                })
            }
            _ => None,
        })
        .collect();
    items.sort_by(|a, b| b.stock.cmp(&a.stock));

    let total_value = items.iter().map(|l| l.total_value).sum();
    let item_count = items.len();
    InventoryValueReport {
        items,
        total_value,
        item_count,
    }
}

pub fn dashboard(
    ingredients: &[Ingredient],
    movements: &[StockMovement],
    now: DateTime<Utc>,
    low_threshold: Decimal,
) -> InventoryDashboard {
    let week_ago = now - Duration::days(7);
    InventoryDashboard {
        total_ingredients: ingredients.len(),
        active_ingredients: active(ingredients).count(),
        low_stock: active(ingredients)
            .filter(|i| i.stock.is_none_or(|s| s < low_threshold))
            .count(),
        out_of_stock: active(ingredients)
            .filter(|i| StockStatus::classify(i.stock, low_threshold) == StockStatus::OutOfStock)
            .count(),
        total_stock: active(ingredients).map(Ingredient::stock_or_zero).sum(),
        recent_movements: movements.iter().filter(|m| m.moved_at >= week_ago).count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingredient::NewIngredient;
    use brewhouse_core::{MovementId, TenantId, UserId};
    use rust_decimal_macros::dec;

    fn ingredient(name: &str, t: IngredientType, stock: Option<Decimal>, cost: Option<Decimal>) -> Ingredient {
        let mut i = Ingredient::register(
            TenantId::new(),
            IngredientId::new(),
            &NewIngredient {
                name: name.to_string(),
                ingredient_type: t,
                unit: "kg".to_string(),
                cost_per_unit: cost,
                supplier_id: None,
                opening_stock: None,
            },
        )
        .unwrap();
        i.stock = stock;
        i
    }

    fn movement(i: &Ingredient, t: MovementType, q: Decimal, at: DateTime<Utc>) -> StockMovement {
        StockMovement {
            id: MovementId::new(),
            tenant_id: i.tenant_id,
            ingredient_id: i.id,
            location_id: None,
            batch_id: None,
            movement_type: t,
            quantity: q,
            unit: i.unit.clone(),
            reason: None,
            reference: None,
            moved_by: UserId::new(),
            moved_at: at,
        }
    }

    #[test]
    fn classification_thresholds() {
        let t = DEFAULT_LOW_STOCK_THRESHOLD;
        assert_eq!(StockStatus::classify(None, t), StockStatus::OutOfStock);
        assert_eq!(StockStatus::classify(Some(dec!(0)), t), StockStatus::OutOfStock);
        assert_eq!(StockStatus::classify(Some(dec!(9.99)), t), StockStatus::LowStock);
        assert_eq!(StockStatus::classify(Some(dec!(10)), t), StockStatus::Adequate);
        assert_eq!(StockStatus::classify(Some(dec!(49.9)), t), StockStatus::Adequate);
        assert_eq!(StockStatus::classify(Some(dec!(50)), t), StockStatus::Good);
        assert_eq!(StockStatus::classify(Some(dec!(15)), dec!(20)), StockStatus::LowStock);
    }

    #[test]
    fn low_stock_lists_untracked_and_low_items_but_skips_inactive() {
        let mut retired = ingredient("Old Hops", IngredientType::Hop, Some(dec!(1)), None);
        retired.is_active = false;
        let ingredients = vec![
            ingredient("Pale Malt", IngredientType::Grain, Some(dec!(120)), None),
            ingredient("Irish Moss", IngredientType::Adjunct, None, None),
            ingredient("US-05", IngredientType::Yeast, Some(dec!(4)), None),
            retired,
        ];

        let alerts = low_stock(&ingredients, DEFAULT_LOW_STOCK_THRESHOLD);
        let names: Vec<&str> = alerts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Irish Moss", "US-05"]);
        assert_eq!(alerts[0].alert, StockStatus::OutOfStock);
        assert_eq!(alerts[1].alert, StockStatus::LowStock);
    }

    #[test]
    fn stock_levels_report_untracked_as_zero_but_flag_it() {
        let ingredients = vec![
            ingredient("Wheat", IngredientType::Grain, Some(dec!(20)), Some(dec!(2))),
            ingredient("Citra", IngredientType::Hop, None, Some(dec!(30))),
        ];
        let levels = stock_levels(&ingredients, DEFAULT_LOW_STOCK_THRESHOLD);
        assert_eq!(levels[0].name, "Citra");
        assert_eq!(levels[0].stock, Decimal::ZERO);
        assert!(!levels[0].tracked);
        assert_eq!(levels[0].status, StockStatus::OutOfStock);
        assert_eq!(levels[1].value, dec!(40));
        assert_eq!(levels[1].status, StockStatus::Adequate);
    }

    #[test]
    fn stock_by_type_groups_active_ingredients() {
        let ingredients = vec![
            ingredient("Pale", IngredientType::Grain, Some(dec!(10)), None),
            ingredient("Munich", IngredientType::Grain, None, None),
            ingredient("Saaz", IngredientType::Hop, Some(dec!(2)), None),
        ];
        let by_type = stock_by_type(&ingredients);
        assert_eq!(by_type.len(), 2);
        assert_eq!(by_type[0].ingredient_type, IngredientType::Grain);
        assert_eq!(by_type[0].count, 2);
        assert_eq!(by_type[0].total_stock, dec!(10));
    }

    #[test]
    fn consumption_trends_only_count_consumption_in_window() {
        let now = Utc::now();
        let pale = ingredient("Pale", IngredientType::Grain, Some(dec!(100)), None);
        let saaz = ingredient("Saaz", IngredientType::Hop, Some(dec!(100)), None);
        let movements = vec![
            movement(&pale, MovementType::Brewing, dec!(25), now - Duration::days(2)),
            movement(&pale, MovementType::Out, dec!(5), now - Duration::days(1)),
            movement(&pale, MovementType::In, dec!(500), now - Duration::days(1)),
            movement(&saaz, MovementType::Spoilage, dec!(40), now - Duration::days(3)),
            movement(&saaz, MovementType::Brewing, dec!(99), now - Duration::days(45)),
        ];

        let trends = consumption_trends(&[pale, saaz], &movements, now - Duration::days(30));
        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].name, "Saaz");
        assert_eq!(trends[0].total_consumed, dec!(40));
        assert_eq!(trends[1].total_consumed, dec!(30));
        assert_eq!(trends[1].movement_count, 2);
    }

    #[test]
    fn inventory_value_skips_unpriced_and_empty_stock() {
        let ingredients = vec![
            ingredient("Pale", IngredientType::Grain, Some(dec!(100)), Some(dec!(1.5))),
            ingredient("Saaz", IngredientType::Hop, Some(dec!(2)), Some(dec!(40))),
            ingredient("Water", IngredientType::Water, Some(dec!(1000)), None),
            ingredient("Yeast", IngredientType::Yeast, Some(dec!(0)), Some(dec!(5))),
        ];
        let report = inventory_value(&ingredients);
        assert_eq!(report.item_count, 2);
        assert_eq!(report.items[0].name, "Pale");
        assert_eq!(report.total_value, dec!(230));
    }

    #[test]
    fn dashboard_counts() {
        let now = Utc::now();
        let pale = ingredient("Pale", IngredientType::Grain, Some(dec!(100)), None);
        let moss = ingredient("Moss", IngredientType::Adjunct, None, None);
        let low = ingredient("Low", IngredientType::Hop, Some(dec!(3)), None);
        let movements = vec![
            movement(&pale, MovementType::In, dec!(100), now - Duration::days(1)),
            movement(&low, MovementType::In, dec!(3), now - Duration::days(8)),
        ];
        let d = dashboard(&[pale, moss, low], &movements, now, DEFAULT_LOW_STOCK_THRESHOLD);
        assert_eq!(d.total_ingredients, 3);
        assert_eq!(d.active_ingredients, 3);
        assert_eq!(d.low_stock, 2);
        assert_eq!(d.out_of_stock, 1);
        assert_eq!(d.total_stock, dec!(103));
        assert_eq!(d.recent_movements, 1);
    }

    #[test]
    fn movement_stats_group_by_type() {
        let now = Utc::now();
        let pale = ingredient("Pale", IngredientType::Grain, None, None);
        let movements = vec![
            movement(&pale, MovementType::In, dec!(10), now - Duration::days(40)),
            movement(&pale, MovementType::In, dec!(5), now),
            movement(&pale, MovementType::Out, dec!(2), now),
        ];
        let stats = movement_stats(&movements);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_type[0].movement_type, MovementType::In);
        assert_eq!(stats.by_type[0].total_quantity, dec!(15));

        let recent = movement_summary_since(&movements, now - Duration::days(30));
        assert_eq!(recent[0].count, 1);
        assert_eq!(recent[0].total_quantity, dec!(5));
        assert_eq!(recent[1].movement_type, MovementType::Out);
    }
}
