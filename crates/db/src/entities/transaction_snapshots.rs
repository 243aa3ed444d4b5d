//! `SeaORM` Entity for transaction_snapshots table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "transaction_snapshots")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub snapshot_id: Uuid,
    pub line_number: i32,
    pub entry_id: Uuid,
    pub entry_date: Date,
    pub reference: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub debit: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub credit: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub running_balance: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::reconciliation_snapshots::Entity",
        from = "Column::SnapshotId",
        to = "super::reconciliation_snapshots::Column::Id",
        on_delete = "Cascade"
    )]
    ReconciliationSnapshots,
}

impl Related<super::reconciliation_snapshots::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReconciliationSnapshots.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
