//! Dosing guidance per (peptide, jurisdiction, context)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dosing_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub peptide_id: i64,

    pub jurisdiction_id: i64,

    /// approved-label, study-reported or expert-consensus
    #[sea_orm(column_type = "Text")]
    pub context: String,

    #[sea_orm(column_type = "Text")]
    pub guidance: String,

    #[sea_orm(column_type = "Text")]
    pub origin: String,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
