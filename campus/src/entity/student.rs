use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "student")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// `app_user.id` in the control plane.
    pub user_id: Uuid,
    pub roll_number: String,
    pub admission_date: Date,
    pub parent_name: String,
    pub parent_phone: String,
    pub parent_email: String,
    pub is_active: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::student_class_assignment::Entity")]
    StudentClassAssignment,
}

impl Related<super::student_class_assignment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StudentClassAssignment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
