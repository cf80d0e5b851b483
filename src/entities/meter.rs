use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Utility a meter measures. Stored and serialized lowercase.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MeterKind {
    #[default]
    #[sea_orm(string_value = "electricity")]
    Electricity,
    #[sea_orm(string_value = "water")]
    Water,
    #[sea_orm(string_value = "gas")]
    Gas,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "meters")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub nickname: String,
    pub kind: MeterKind,
    /// Tenant billed for this meter
    pub tenant: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::reading::Entity")]
    Readings,
}

impl Related<super::reading::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Readings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!(MeterKind::from_str("Water").unwrap(), MeterKind::Water);
        assert_eq!(MeterKind::from_str("gas").unwrap(), MeterKind::Gas);
        assert!(MeterKind::from_str("steam").is_err());
    }

    #[test]
    fn kind_displays_lowercase_and_defaults_to_electricity() {
        assert_eq!(MeterKind::default(), MeterKind::Electricity);
        assert_eq!(MeterKind::Electricity.to_string(), "electricity");
        assert_eq!(
            serde_json::to_string(&MeterKind::Water).unwrap(),
            "\"water\""
        );
    }
}
