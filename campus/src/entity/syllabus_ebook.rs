use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "syllabus_ebook")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub board_id: i32,
    pub subject_id: i32,
    pub class_id: i32,
    pub ebook_type: Option<String>,
    pub ebook_name: String,
    /// Object-store key of the uploaded document.
    pub file_path: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::board::Entity",
        from = "Column::BoardId",
        to = "super::board::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Board,
    #[sea_orm(has_many = "super::catalog_chapter::Entity")]
    CatalogChapter,
}

impl Related<super::board::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Board.def()
    }
}

impl Related<super::catalog_chapter::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CatalogChapter.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
