//! Vendor entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vendors")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "Text", unique)]
    pub slug: String,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    /// Storefront domain, used as an extra search term
    #[sea_orm(column_type = "Text", nullable)]
    pub domain: Option<String>,

    /// Declared trust signals as a JSON array of signal names
    #[sea_orm(column_type = "JsonBinary")]
    pub trust_signals: Json,

    pub is_published: bool,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::vendor_listing::Entity")]
    Listings,

    #[sea_orm(has_many = "super::vendor_rating_snapshot::Entity")]
    RatingSnapshots,
}

impl Related<super::vendor_listing::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Listings.def()
    }
}

impl Related<super::vendor_rating_snapshot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RatingSnapshots.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
