use sea_orm::entity::prelude::*;

/// Tenant connection record: where a school's database lives.
///
/// `db_name` is immutable once written and doubles as the registry key.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "school_db_metadata")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub school_id: i32,
    #[sea_orm(unique)]
    pub db_name: String,
    pub db_user: String,
    /// AES-256-GCM encrypted base64
    pub db_password: String,
    pub db_host: String,
    pub db_port: i32,
    pub is_active: bool,
    pub provisioning_complete: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::school::Entity",
        from = "Column::SchoolId",
        to = "super::school::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    School,
}

impl Related<super::school::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::School.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
