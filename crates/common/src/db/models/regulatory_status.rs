//! Regulatory status per (peptide, jurisdiction)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "peptide_regulatory_statuses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub peptide_id: i64,

    pub jurisdiction_id: i64,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    /// "curator" or "machine"
    #[sea_orm(column_type = "Text")]
    pub asserted_by: String,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
