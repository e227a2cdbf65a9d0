use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "board")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub board_name: String,
    pub is_active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::school_board_mapping::Entity")]
    SchoolBoardMapping,
    #[sea_orm(has_many = "super::syllabus_ebook::Entity")]
    SyllabusEbook,
}

impl Related<super::school_board_mapping::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SchoolBoardMapping.def()
    }
}

impl Related<super::syllabus_ebook::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SyllabusEbook.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
