use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "school_class")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub class_number: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::school_section::Entity")]
    SchoolSection,
}

impl Related<super::school_section::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SchoolSection.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
