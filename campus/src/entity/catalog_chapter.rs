use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "catalog_chapter")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub ebook_id: i32,
    pub chapter_number: i32,
    pub chapter_name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::syllabus_ebook::Entity",
        from = "Column::EbookId",
        to = "super::syllabus_ebook::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    SyllabusEbook,
    #[sea_orm(has_many = "super::catalog_sub_topic::Entity")]
    CatalogSubTopic,
    #[sea_orm(has_many = "super::catalog_prerequisite::Entity")]
    CatalogPrerequisite,
}

impl Related<super::syllabus_ebook::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SyllabusEbook.def()
    }
}

impl Related<super::catalog_sub_topic::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CatalogSubTopic.def()
    }
}

impl Related<super::catalog_prerequisite::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CatalogPrerequisite.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
