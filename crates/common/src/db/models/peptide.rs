//! Peptide entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "peptides")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Immutable once assigned
    #[sea_orm(column_type = "Text", unique)]
    pub slug: String,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    /// Pharmacological class, e.g. "GLP-1 receptor agonist"
    #[sea_orm(column_type = "Text", nullable)]
    pub class_name: Option<String>,

    pub is_published: bool,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::peptide_alias::Entity")]
    Aliases,

    #[sea_orm(has_one = "super::peptide_profile::Entity")]
    Profile,
}

impl Related<super::peptide_alias::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Aliases.def()
    }
}

impl Related<super::peptide_profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Profile.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
