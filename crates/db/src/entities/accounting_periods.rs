//! `SeaORM` Entity for accounting_periods table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "accounting_periods")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub start_date: Date,
    pub end_date: Date,
    pub status: String,
    pub locked: bool,
    pub locked_at: Option<DateTimeWithTimeZone>,
    pub locked_by: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_revenue: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_expense: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub net_income: Decimal,
    pub total_entries: i64,
    pub closing_entry_id: Option<Uuid>,
    pub retained_earnings_id: Uuid,
    pub closed_at: DateTimeWithTimeZone,
    pub reopened_at: Option<DateTimeWithTimeZone>,
    #[sea_orm(column_type = "Text", nullable)]
    pub reopen_reason: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::RetainedEarningsId",
        to = "super::accounts::Column::Id"
    )]
    RetainedEarnings,
}

impl ActiveModelBehavior for ActiveModel {}
