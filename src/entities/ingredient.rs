use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Stock state derived from quantity and threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StockStatus {
    Critical,
    Ok,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ingredients")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    /// Current stock. Not clamped; consumption may drive it negative.
    pub quantity: f64,
    /// Alert threshold, inclusive
    pub critical_quantity: f64,
    pub image_ref: Option<String>,
    /// Bumped on every stock write; guards against lost updates
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stock_transaction::Entity")]
    StockTransactions,
}

impl Related<super::stock_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockTransactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_critical(&self) -> bool {
        is_critical(self.quantity, self.critical_quantity)
    }

    pub fn status(&self) -> StockStatus {
        if self.is_critical() {
            StockStatus::Critical
        } else {
            StockStatus::Ok
        }
    }
}

/// Equality counts as critical.
pub fn is_critical(quantity: f64, critical_quantity: f64) -> bool {
    quantity <= critical_quantity
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingredient(quantity: f64, critical_quantity: f64) -> Model {
        let now = Utc::now();
        Model {
            id: 1,
            name: "Flour".into(),
            quantity,
            critical_quantity,
            image_ref: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn boundary_is_critical() {
        assert_eq!(ingredient(2.0, 2.0).status(), StockStatus::Critical);
        assert_eq!(ingredient(-1.0, 0.0).status(), StockStatus::Critical);
        assert_eq!(ingredient(2.5, 2.0).status(), StockStatus::Ok);
    }
}
