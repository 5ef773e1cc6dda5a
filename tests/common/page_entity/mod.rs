use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "pages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub book_id: i32,
    pub number: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::book_entity::Entity",
        from = "Column::BookId",
        to = "super::book_entity::Column::Id"
    )]
    Book,
    #[sea_orm(has_many = "super::line_entity::Entity")]
    Lines,
}

impl Related<super::book_entity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Book.def()
    }
}

impl Related<super::line_entity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Query paths exposed for joined pages
pub fn columns() -> Vec<(&'static str, Column)> {
    vec![("id", Column::Id), ("number", Column::Number)]
}
