//! Safety text per (peptide, jurisdiction)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "safety_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub peptide_id: i64,

    pub jurisdiction_id: i64,

    #[sea_orm(column_type = "Text")]
    pub adverse_effects: String,

    #[sea_orm(column_type = "Text")]
    pub contraindications: String,

    #[sea_orm(column_type = "Text")]
    pub interactions: String,

    #[sea_orm(column_type = "Text")]
    pub monitoring: String,

    /// Bit per text field, set when a machine write produced it
    pub generated_mask: i16,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
