use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "books")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub title: String,
    pub rating: f64,
    pub published: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::page_entity::Entity")]
    Pages,
}

impl Related<super::page_entity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Pages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Query paths exposed for the books resource
pub fn columns() -> Vec<(&'static str, Column)> {
    vec![
        ("id", Column::Id),
        ("title", Column::Title),
        ("rating", Column::Rating),
        ("published", Column::Published),
    ]
}
