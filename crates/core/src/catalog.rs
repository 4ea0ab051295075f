//! Reference records owned by the catalog (recipes, locations, tanks, suppliers).
//!
//! The production and inventory rules only need to resolve these by id within a
//! tenant and show their names.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::id::{LocationId, RecipeId, SupplierId, TankId, TenantId};
use crate::tenant::TenantScoped;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub tenant_id: TenantId,
    pub name: String,
    pub style: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub tenant_id: TenantId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tank {
    pub id: TankId,
    pub tenant_id: TenantId,
    pub name: String,
    /// Capacity in litres.
    pub capacity: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub tenant_id: TenantId,
    pub name: String,
    pub is_active: bool,
}

macro_rules! tenant_scoped {
    ($($t:ty),*) => {
        $(impl TenantScoped for $t {
            fn tenant_id(&self) -> TenantId {
                self.tenant_id
            }
        })*
    };
}

tenant_scoped!(Recipe, Location, Tank, Supplier);
