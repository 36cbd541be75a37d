//! Graded statement about a peptide or vendor

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "claims")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// "peptide" or "vendor"
    #[sea_orm(column_type = "Text")]
    pub entity_kind: String,

    pub entity_id: i64,

    /// Display label; for generated claims the source section tag
    #[sea_orm(column_type = "Text")]
    pub section: String,

    /// "curated" or "generated"; deletion is scoped on this, never on `section` alone
    #[sea_orm(column_type = "Text")]
    pub origin: String,

    #[sea_orm(column_type = "Text")]
    pub text: String,

    #[sea_orm(column_type = "Text")]
    pub grade: String,

    pub citation_id: Option<i64>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::citation::Entity",
        from = "Column::CitationId",
        to = "super::citation::Column::Id"
    )]
    Citation,
}

impl Related<super::citation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Citation.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
