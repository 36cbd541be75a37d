//! Alternate names for a peptide

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "peptide_aliases")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub peptide_id: i64,

    #[sea_orm(column_type = "Text")]
    pub alias: String,

    /// Output of `normalize_alias`; unique per peptide
    #[sea_orm(column_type = "Text")]
    pub normalized: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::peptide::Entity",
        from = "Column::PeptideId",
        to = "super::peptide::Column::Id",
        on_delete = "Cascade"
    )]
    Peptide,
}

impl Related<super::peptide::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Peptide.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
