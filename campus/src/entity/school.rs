use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "school")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub address: String,
    pub contact_number: Option<String>,
    #[sea_orm(unique)]
    pub email: Option<String>,
    pub school_admin_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::school_board_mapping::Entity")]
    SchoolBoardMapping,
    #[sea_orm(has_one = "super::school_db_metadata::Entity")]
    SchoolDbMetadata,
}

impl Related<super::school_board_mapping::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SchoolBoardMapping.def()
    }
}

impl Related<super::school_db_metadata::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SchoolDbMetadata.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
