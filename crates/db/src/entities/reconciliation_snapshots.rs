//! `SeaORM` Entity for reconciliation_snapshots table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "reconciliation_snapshots")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub account_id: Uuid,
    pub period: String,
    pub snapshot_date: Date,
    pub captured_at: DateTimeWithTimeZone,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub opening_balance: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub closing_balance: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_debit: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_credit: Decimal,
    pub transaction_count: i64,
    pub data_hash: String,
    pub locked: bool,
    pub locked_at: Option<DateTimeWithTimeZone>,
    pub locked_by: Option<String>,
    pub status: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transaction_snapshots::Entity")]
    TransactionSnapshots,
}

impl Related<super::transaction_snapshots::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TransactionSnapshots.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
