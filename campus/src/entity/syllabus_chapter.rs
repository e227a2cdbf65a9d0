use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "syllabus_chapter")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Control-plane board id; not a foreign key.
    pub board_id: i32,
    pub academic_year_id: i32,
    pub class_id: Option<i32>,
    pub subject_id: Option<i32>,
    pub chapter_number: i32,
    pub chapter_name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::academic_year::Entity",
        from = "Column::AcademicYearId",
        to = "super::academic_year::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    AcademicYear,
    #[sea_orm(has_many = "super::syllabus_sub_topic::Entity")]
    SyllabusSubTopic,
    #[sea_orm(has_many = "super::syllabus_prerequisite::Entity")]
    SyllabusPrerequisite,
}

impl Related<super::academic_year::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AcademicYear.def()
    }
}

impl Related<super::syllabus_sub_topic::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SyllabusSubTopic.def()
    }
}

impl Related<super::syllabus_prerequisite::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SyllabusPrerequisite.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
