use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use brewhouse_core::{AggregateRoot, DomainError, IngredientId, SupplierId, TenantId, TenantScoped};

/// Raw material category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngredientType {
    Grain,
    Hop,
    Yeast,
    Adjunct,
    Water,
    Other,
}

impl IngredientType {
    pub const ALL: [IngredientType; 6] = [
        IngredientType::Grain,
        IngredientType::Hop,
        IngredientType::Yeast,
        IngredientType::Adjunct,
        IngredientType::Water,
        IngredientType::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IngredientType::Grain => "GRAIN",
            IngredientType::Hop => "HOP",
            IngredientType::Yeast => "YEAST",
            IngredientType::Adjunct => "ADJUNCT",
            IngredientType::Water => "WATER",
            IngredientType::Other => "OTHER",
        }
    }
}

impl core::fmt::Display for IngredientType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IngredientType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IngredientType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown ingredient type: {s}")))
    }
}

/// Aggregate root: Ingredient.
///
/// `stock` is the projected balance of the ingredient's movement ledger.
/// `None` means the balance is not tracked yet; only an ADJUSTMENT movement
/// establishes a tracked balance. Nothing outside `apply` writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: IngredientId,
    pub tenant_id: TenantId,
    pub name: String,
    pub ingredient_type: IngredientType,
    /// Unit of measure; opaque, matched verbatim.
    pub unit: String,
    pub stock: Option<Decimal>,
    pub cost_per_unit: Option<Decimal>,
    pub supplier_id: Option<SupplierId>,
    pub is_active: bool,
    pub version: u64,
}

/// Catalog input for registering an ingredient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIngredient {
    pub name: String,
    pub ingredient_type: IngredientType,
    pub unit: String,
    pub cost_per_unit: Option<Decimal>,
    pub supplier_id: Option<SupplierId>,
    /// Posted as an ADJUSTMENT movement right after registration.
    pub opening_stock: Option<Decimal>,
}

impl Ingredient {
    /// Build an untracked ingredient from catalog input.
    pub fn register(tenant_id: TenantId, id: IngredientId, input: &NewIngredient) -> Result<Self, DomainError> {
        if input.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if input.unit.trim().is_empty() {
            return Err(DomainError::validation("unit cannot be empty"));
        }
        Ok(Self {
            id,
            tenant_id,
            name: input.name.trim().to_string(),
            ingredient_type: input.ingredient_type,
            unit: input.unit.clone(),
            stock: None,
            cost_per_unit: input.cost_per_unit,
            supplier_id: input.supplier_id,
            is_active: true,
            version: 0,
        })
    }

    /// Balance for threshold comparisons: untracked counts as zero.
    pub fn stock_or_zero(&self) -> Decimal {
        self.stock.unwrap_or(Decimal::ZERO)
    }

    /// Stock valued at cost; zero when either side is unknown.
    pub fn stock_value(&self) -> Decimal {
        match (self.stock, self.cost_per_unit) {
            (Some(stock), Some(cost)) => stock * cost,
            _ => Decimal::ZERO,
        }
    }
}

impl AggregateRoot for Ingredient {
    type Id = IngredientId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl TenantScoped for Ingredient {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn input() -> NewIngredient {
        NewIngredient {
            name: "  Pilsner Malt ".to_string(),
            ingredient_type: IngredientType::Grain,
            unit: "kg".to_string(),
            cost_per_unit: Some(dec!(1.20)),
            supplier_id: None,
            opening_stock: Some(dec!(100)),
        }
    }

    #[test]
    fn registered_ingredients_start_untracked() {
        let ingredient = Ingredient::register(TenantId::new(), IngredientId::new(), &input()).unwrap();
        assert_eq!(ingredient.name, "Pilsner Malt");
        assert_eq!(ingredient.stock, None);
        assert!(ingredient.is_active);
        assert_eq!(ingredient.stock_or_zero(), Decimal::ZERO);
        assert_eq!(ingredient.stock_value(), Decimal::ZERO);
    }

    #[test]
    fn blank_names_are_rejected() {
        let mut bad = input();
        bad.name = "   ".to_string();
        assert!(matches!(
            Ingredient::register(TenantId::new(), IngredientId::new(), &bad),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn ingredient_type_parses_its_own_names() {
        for t in IngredientType::ALL {
            assert_eq!(t.as_str().parse::<IngredientType>().unwrap(), t);
        }
        assert!("MALT".parse::<IngredientType>().is_err());
    }
}
