//! Long-form profile text, one row per peptide

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "peptide_profiles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(unique)]
    pub peptide_id: i64,

    #[sea_orm(column_type = "Text")]
    pub intro: String,

    #[sea_orm(column_type = "Text")]
    pub mechanism: String,

    #[sea_orm(column_type = "Text")]
    pub effectiveness: String,

    #[sea_orm(column_type = "Text")]
    pub long_description: String,

    /// "curated" or "generated"
    #[sea_orm(column_type = "Text")]
    pub origin: String,

    pub updated_at: DateTimeWithTimeZone,
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
