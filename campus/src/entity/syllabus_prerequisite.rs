use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "syllabus_prerequisite")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub chapter_id: i32,
    pub topic: String,
    #[sea_orm(column_type = "Text")]
    pub explanation: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::syllabus_chapter::Entity",
        from = "Column::ChapterId",
        to = "super::syllabus_chapter::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    SyllabusChapter,
}

impl Related<super::syllabus_chapter::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SyllabusChapter.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
