//! `SeaORM` Entity for the file_metadata table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "file_metadata")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub original_file_name: String,
    #[sea_orm(unique)]
    pub s3_object_key: String,
    pub content_type: String,
    pub file_size: i64,
    pub upload_timestamp: DateTimeWithTimeZone,
    pub share_token: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
