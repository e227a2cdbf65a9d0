use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "academic_year")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub is_active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::syllabus_chapter::Entity")]
    SyllabusChapter,
}

impl Related<super::syllabus_chapter::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SyllabusChapter.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
