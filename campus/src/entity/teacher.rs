use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "teacher")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// `app_user.id` in the control plane.
    #[sea_orm(unique)]
    pub user_id: Uuid,
    pub qualification: Option<String>,
    pub experience: Option<f64>,
    pub joining_date: Option<Date>,
    pub emergency_contact: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::class_assignment::Entity")]
    ClassAssignment,
}

impl Related<super::class_assignment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ClassAssignment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
