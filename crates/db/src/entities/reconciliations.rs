//! `SeaORM` Entity for reconciliations table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "reconciliations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub account_id: Uuid,
    pub base_snapshot_id: Uuid,
    pub comparison_snapshot_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub base_balance: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub current_balance: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub variance: Decimal,
    pub base_count: i64,
    pub current_count: i64,
    pub missing_count: i64,
    pub added_count: i64,
    pub modified_count: i64,
    pub status: String,
    pub is_balanced: bool,
    #[sea_orm(column_type = "Text", nullable)]
    pub review_notes: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTimeWithTimeZone>,
    pub created_by: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::reconciliation_differences::Entity")]
    ReconciliationDifferences,
}

impl Related<super::reconciliation_differences::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReconciliationDifferences.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
