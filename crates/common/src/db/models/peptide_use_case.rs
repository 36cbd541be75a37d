//! Graded (peptide, use case, jurisdiction) mapping

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "peptide_use_cases")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub peptide_id: i64,

    pub use_case_id: i64,

    pub jurisdiction_id: i64,

    /// Evidence grade letter
    #[sea_orm(column_type = "Text")]
    pub grade: String,

    #[sea_orm(column_type = "Text")]
    pub consumer_summary: String,

    #[sea_orm(column_type = "Text")]
    pub clinician_summary: String,

    #[sea_orm(column_type = "Text")]
    pub origin: String,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
