use sea_orm::entity::prelude::*;

/// Database row of a single archived bridge event. Headers are stored
/// as a JSON object; payload bytes are kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(column_name = "type")]
    pub event_type: String,

    pub created_at: i64,

    pub headers: String,

    pub data: Vec<u8>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
