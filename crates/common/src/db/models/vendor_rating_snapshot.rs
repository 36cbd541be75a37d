//! Point-in-time vendor rating; at most one current row per vendor

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vendor_rating_snapshots")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub vendor_id: i64,

    /// 0..=5, NULL when unrated
    #[sea_orm(column_type = "Double", nullable)]
    pub rating: Option<f64>,

    /// 0..=1, NULL when unrated
    #[sea_orm(column_type = "Double", nullable)]
    pub confidence: Option<f64>,

    #[sea_orm(column_type = "Text")]
    pub method_version: String,

    /// JSON array of reason tags
    #[sea_orm(column_type = "JsonBinary")]
    pub reason_tags: Json,

    pub is_current: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::vendor::Entity",
        from = "Column::VendorId",
        to = "super::vendor::Column::Id",
        on_delete = "Cascade"
    )]
    Vendor,
}

impl Related<super::vendor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vendor.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
